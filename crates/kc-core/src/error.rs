use thiserror::Error;

pub type KcResult<T> = Result<T, KcError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KcError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },
}
