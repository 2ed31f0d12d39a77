use crate::exception::{Throwable, panic};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Polls a future inside a panic catch scope.
///
/// A panic while polling completes the future with the [`Throwable`] built
/// from it; the inner future is not polled again.
pub(crate) struct CatchPanic<F> {
    inner: Pin<Box<F>>,
}

impl<F: Future> CatchPanic<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner: Box::pin(inner),
        }
    }
}

impl<F: Future> Future for CatchPanic<F> {
    type Output = Result<F::Output, Throwable>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = &mut self.get_mut().inner;
        match panic::catch(|| inner.as_mut().poll(cx)) {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Err(failure) => Poll::Ready(Err(failure)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passes_output_through() {
        let output = CatchPanic::new(async { 5 }).await;
        assert_eq!(output.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_panic_after_await_is_caught() {
        let failure = CatchPanic::new(async {
            tokio::task::yield_now().await;
            if true {
                panic!("late failure");
            }
        })
        .await
        .unwrap_err();
        assert_eq!(failure.message(), "late failure");
    }
}
