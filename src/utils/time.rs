use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Run `fut` under a deadline. Elapsing maps to [`Error::Timeout`] naming `what`.
pub async fn with_deadline<T, F>(deadline: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(format!(
            "{} did not complete within {:?}",
            what, deadline
        ))),
    }
}

/// `read_exact` bounded by an optional deadline
pub async fn read_exact_within<R>(
    reader: &mut R,
    buf: &mut [u8],
    deadline: Option<Duration>,
    what: &str,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let fut = async {
        reader.read_exact(buf).await?;
        Ok(())
    };
    match deadline {
        Some(d) => with_deadline(d, what, fut).await,
        None => fut.await,
    }
}

/// `write_all` + `flush` bounded by an optional deadline
pub async fn write_all_within<W>(
    writer: &mut W,
    data: &[u8],
    deadline: Option<Duration>,
    what: &str,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let fut = async {
        writer.write_all(data).await?;
        writer.flush().await?;
        Ok(())
    };
    match deadline {
        Some(d) => with_deadline(d, what, fut).await,
        None => fut.await,
    }
}
