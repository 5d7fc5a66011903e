//! Sequential async evaluation with early exit.

use std::future::Future;
use std::ops::ControlFlow;

/// Fold `items` in order with an async step; a `Break` ends the fold at once.
///
/// Returns the accumulator on `Continue` through the end, or the `Break` value.
pub async fn try_fold_until<I, A, B, F, Fut>(items: I, init: A, mut step: F) -> ControlFlow<B, A>
where
    I: IntoIterator,
    F: FnMut(A, I::Item) -> Fut,
    Fut: Future<Output = ControlFlow<B, A>>,
{
    let mut acc = init;
    for item in items {
        match step(acc, item).await {
            ControlFlow::Continue(next) => acc = next,
            ControlFlow::Break(b) => return ControlFlow::Break(b),
        }
    }
    ControlFlow::Continue(acc)
}

/// True if every item satisfies `pred`; stops at the first `false`. Empty is `true`.
pub async fn all_async<I, F, Fut>(items: I, mut pred: F) -> bool
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = bool>,
{
    let flow = try_fold_until(items, (), |(), item| {
        let fut = pred(item);
        async move {
            if fut.await {
                ControlFlow::Continue(())
            } else {
                ControlFlow::Break(())
            }
        }
    })
    .await;
    flow.is_continue()
}
