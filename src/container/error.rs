#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid container id: {0}")]
    InvalidContainerID(String),
    #[error("cannot derive container uuid from id `{0}`")]
    InvalidContainerUuid(String),
}
pub type Result<T> = std::result::Result<T, Error>;
