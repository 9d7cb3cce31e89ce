use crate::container::ContainerUuid;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Uuid(#[from] crate::container::Error),
    #[error("uuid {uuid} of container `{id}` is already used by container `{existing}`")]
    UuidCollision {
        uuid: ContainerUuid,
        id: String,
        existing: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
