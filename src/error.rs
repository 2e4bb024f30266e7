use std::fmt;

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::dds::ReturnCode;

/// Numeric return codes of the rmw API.
///
/// See [rmw/ret_types.h](https://github.com/ros2/rmw/blob/master/rmw/include/rmw/ret_types.h)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum RetCode {
  Ok = 0,
  Error = 1,
  Timeout = 2,
  Unsupported = 3,
  BadAlloc = 10,
  InvalidArgument = 11,
  IncorrectRmwImplementation = 12,
}

/// What went wrong in an rmw call.
///
/// Every variant except `Unsupported` and `Timeout` carries the error string
/// that the C API would have stored with `RMW_SET_ERROR_MSG`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RmwError {
  Error(String),
  InvalidArgument(String),
  IncorrectImplementation(String),
  BadAlloc(String),
  Unsupported,
  Timeout,
}

pub type RmwResult<T> = Result<T, RmwError>;

impl RmwError {
  pub fn ret_code(&self) -> RetCode {
    match self {
      RmwError::Error(_) => RetCode::Error,
      RmwError::InvalidArgument(_) => RetCode::InvalidArgument,
      RmwError::IncorrectImplementation(_) => RetCode::IncorrectRmwImplementation,
      RmwError::BadAlloc(_) => RetCode::BadAlloc,
      RmwError::Unsupported => RetCode::Unsupported,
      RmwError::Timeout => RetCode::Timeout,
    }
  }

  pub(crate) fn error(msg: impl Into<String>) -> RmwError {
    RmwError::Error(msg.into())
  }
}

impl fmt::Display for RmwError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      RmwError::Error(msg) => write!(f, "{msg}"),
      RmwError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
      RmwError::IncorrectImplementation(msg) => write!(f, "{msg}"),
      RmwError::BadAlloc(msg) => write!(f, "allocation failed: {msg}"),
      RmwError::Unsupported => write!(f, "operation not supported by this rmw implementation"),
      RmwError::Timeout => write!(f, "timed out"),
    }
  }
}

impl std::error::Error for RmwError {}

/// Translate a DDS return code into an rmw result.
pub fn ret_from_dds(return_code: ReturnCode) -> RmwResult<()> {
  match return_code {
    ReturnCode::Ok => Ok(()),
    ReturnCode::Timeout => Err(RmwError::Timeout),
    other => Err(RmwError::Error(format!("DDS call failed: {other}"))),
  }
}

/// Translate a failed `WaitSet::attach_condition` into an rmw error.
pub fn check_attach_condition_error(result: Result<(), ReturnCode>) -> RmwResult<()> {
  match result {
    Ok(()) => Ok(()),
    Err(ReturnCode::OutOfResources) => Err(RmwError::error(
      "failed to attach condition to wait set: out of resources",
    )),
    Err(ReturnCode::BadParameter) => Err(RmwError::error(
      "failed to attach condition to wait set: condition was invalid",
    )),
    Err(_) => Err(RmwError::error("failed to attach condition to wait set")),
  }
}

#[cfg(test)]
mod test {
  use test_case::test_case;

  use super::*;

  #[test_case(ReturnCode::Ok => Ok(()))]
  #[test_case(ReturnCode::Timeout => Err(RetCode::Timeout))]
  #[test_case(ReturnCode::Unsupported => Err(RetCode::Error))]
  #[test_case(ReturnCode::Error => Err(RetCode::Error))]
  #[test_case(ReturnCode::NoData => Err(RetCode::Error))]
  fn dds_return_codes(rc: ReturnCode) -> Result<(), RetCode> {
    ret_from_dds(rc).map_err(|e| e.ret_code())
  }

  #[test]
  fn attach_errors_name_the_cause() {
    let e = check_attach_condition_error(Err(ReturnCode::OutOfResources)).unwrap_err();
    assert!(e.to_string().contains("out of resources"));
    let e = check_attach_condition_error(Err(ReturnCode::BadParameter)).unwrap_err();
    assert!(e.to_string().contains("invalid"));
    assert!(check_attach_condition_error(Ok(())).is_ok());
  }
}
