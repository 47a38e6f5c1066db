use std::io;

use bytes::{Buf, Bytes};
use futures::stream::{StreamExt, TryStreamExt};
use warp::multipart::{FormData, Part};

use crate::catalog::ImageUpload;
use crate::entities::NewStadium;
use crate::errors::BackendError;

const METADATA_PART: &str = "data";
const IMAGE_PART: &str = "images";

/// The parts of a stadium registration form.
pub struct StadiumSubmission {
    pub metadata: NewStadium,
    pub images: Vec<ImageUpload>,
}

/// Splits a stadium registration form into its metadata and images.
/// Parts with other names are ignored.
///
/// Each part is read to the end before the next one is requested.
pub async fn parse_stadium_submission(
    content: FormData,
) -> Result<StadiumSubmission, BackendError> {
    futures::pin_mut!(content);

    let mut raw_metadata = None;
    let mut images = vec![];

    while let Some(part) = content
        .try_next()
        .await
        .map_err(|_| BackendError::MalformedFormSubmission)?
    {
        let name = part.name().to_owned();

        match name.as_str() {
            METADATA_PART => {
                let data = part_as_vec(part)
                    .await
                    .map_err(|_| BackendError::MalformedFormSubmission)?;
                raw_metadata = Some(data);
            }
            IMAGE_PART => images.push(read_image(part).await?),
            _ => {}
        }
    }

    let raw_metadata = raw_metadata.ok_or(BackendError::PartsMissing)?;
    let metadata: NewStadium =
        serde_json::from_slice(&raw_metadata).map_err(BackendError::MalformedUploadMetadata)?;

    Ok(StadiumSubmission { metadata, images })
}

async fn read_image(part: Part) -> Result<ImageUpload, BackendError> {
    let content_type = part.content_type().unwrap_or_default().to_owned();

    let data = part_as_vec(part)
        .await
        .map_err(|_| BackendError::MalformedFormSubmission)?;

    Ok(ImageUpload { content_type, data })
}

/// Collects chunks of [`Part`].
pub async fn part_as_vec(raw: Part) -> Result<Vec<u8>, ()> {
    let vec_of_results = part_as_stream(raw).collect::<Vec<_>>().await;

    let vec_of_vecs = vec_of_results
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ())?;

    Ok(vec_of_vecs.concat())
}

/// Collects raw data from [`Part`].
pub fn part_as_stream(raw: Part) -> impl futures::Stream<Item = Result<Bytes, io::Error>> {
    raw.stream().map(|r| {
        r.map(|mut x| x.copy_to_bytes(x.remaining()))
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "could not retrieve chunk"))
    })
}
