use std::fmt;

use crate::error::{RmwError, RmwResult};

/// Tags every rmw handle with the implementation that created it.
///
/// Handles are rejected when the tag of the handle differs from the tag
/// of the implementation that is asked to operate on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Implementation {
  /// Statically generated type support, `rmw_connext_cpp`
  Connext,
  /// Introspection based type support, `rmw_connext_dynamic_cpp`
  ConnextDynamic,
}

impl Implementation {
  pub fn identifier(&self) -> &'static str {
    match self {
      Implementation::Connext => "rmw_connext_cpp",
      Implementation::ConnextDynamic => "rmw_connext_dynamic_cpp",
    }
  }
}

impl fmt::Display for Implementation {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.identifier())
  }
}

pub(crate) fn check_implementation(
  what: &str,
  handle: Implementation,
  expected: Implementation,
) -> RmwResult<()> {
  if handle == expected {
    Ok(())
  } else {
    Err(RmwError::IncorrectImplementation(format!(
      "{what} implementation '{handle}' does not match rmw implementation '{expected}'"
    )))
  }
}
