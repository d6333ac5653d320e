use std::fmt;
use std::io;

/// Errors raised while building or emitting a solver model.
///
/// Every semantic/coverage error is fatal for emission: the emitter stops at
/// the first one and returns it to the caller, which decides whether to
/// terminate the process. `DuplicateVariable` is the one non-fatal status,
/// reported by [`crate::model::SolverModel::add_var`] so the caller can choose
/// to halt parsing.
#[derive(Debug)]
pub enum Error {
    /// Binary or unary operator outside `+ - * /`.
    UnknownOperator(char),
    /// Function call the emitter cannot lower (only `sin`, `cos`, `pow`).
    UnsupportedFunction(String),
    /// Identifier that is neither a registered variable nor a parameter.
    UndefinedIdentifier(String),
    /// Field values sampled at two different boundary locations in one equation.
    AmbiguousBoundary(String),
    /// Equation routed to boundary emission with nothing anchoring it to a boundary.
    NoBoundaryContext(String),
    /// More than one boundary condition imposed on the same end of an equation.
    TooManyBoundaryConditions(String),
    /// Derivative with respect to anything but `r`.
    DifferentiationVariable(String),
    /// Boundary conditions may only constrain registered variables.
    OnlyVariablesInBoundary(String),
    /// Variable registered twice; the model is left unchanged.
    DuplicateVariable(String),
    /// Construct outside the supported subset, described by its debug tag.
    NotImplemented(String),
    Parse(String),
    Io(io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnknownOperator(op) => {
                write!(f, "unknown operator precedence for operator {}", op)
            }
            Error::UnsupportedFunction(name) => write!(f, "function {} not yet handled", name),
            Error::UndefinedIdentifier(name) => write!(f, "undefined identifier {}", name),
            Error::AmbiguousBoundary(eq) => write!(
                f,
                "value of field needed at 2 different locations in equation {}",
                eq
            ),
            Error::NoBoundaryContext(eq) => {
                write!(f, "no reason to set equation {} at a boundary", eq)
            }
            Error::TooManyBoundaryConditions(eq) => {
                write!(f, "too many BC imposed on equation {}", eq)
            }
            Error::DifferentiationVariable(name) => {
                write!(f, "cannot differentiate wrt {} in boundary conditions", name)
            }
            Error::OnlyVariablesInBoundary(name) => {
                write!(f, "only variables are allowed in BC, got {}", name)
            }
            Error::DuplicateVariable(name) => write!(f, "variable {} already registered", name),
            Error::NotImplemented(what) => write!(f, "not yet implemented: {}", what),
            Error::Parse(msg) => write!(f, "{}", msg),
            Error::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
