use thiserror::Error;

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no credential available to create a new session")]
    MissingCredential,
}
