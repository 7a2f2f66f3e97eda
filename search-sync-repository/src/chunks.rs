//! Chunked batch execution.

use std::future::Future;

/// Run `operation` once per consecutive slice of at most `chunk_size` items.
///
/// Slices are handed over in their original order and never empty, so an empty
/// input performs no call at all. The first failing chunk stops processing;
/// chunks already sent are not rolled back.
///
/// A `chunk_size` of zero is treated as one.
///
/// # Returns
///
/// * `Ok(Vec<R>)` - One result per chunk, in chunk order
/// * `Err(E)` - The error of the first failing chunk
pub async fn process_chunks<'a, T, R, E, F, Fut>(
    items: &'a [T],
    chunk_size: usize,
    mut operation: F,
) -> Result<Vec<R>, E>
where
    F: FnMut(&'a [T]) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let mut results = Vec::with_capacity(items.len().div_ceil(chunk_size.max(1)));
    for chunk in items.chunks(chunk_size.max(1)) {
        results.push(operation(chunk).await?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_chunk_when_size_exceeds_input() {
        let items = [1, 2, 3, 4, 5];
        let mut calls: Vec<Vec<i32>> = Vec::new();

        let results = process_chunks(&items, 100, |chunk| {
            calls.push(chunk.to_vec());
            async move { Ok::<_, String>(chunk.len()) }
        })
        .await
        .unwrap();

        assert_eq!(calls, vec![vec![1, 2, 3, 4, 5]]);
        assert_eq!(results, vec![5]);
    }

    #[tokio::test]
    async fn test_splits_in_order_without_empty_tail() {
        let items = [1, 2, 3, 4, 5];
        let mut calls: Vec<Vec<i32>> = Vec::new();

        process_chunks(&items, 3, |chunk| {
            calls.push(chunk.to_vec());
            async { Ok::<_, String>(()) }
        })
        .await
        .unwrap();

        assert_eq!(calls, vec![vec![1, 2, 3], vec![4, 5]]);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_call() {
        let items: [i32; 0] = [];
        let mut count = 0;

        let results = process_chunks(&items, 3, |_| {
            count += 1;
            async { Ok::<_, String>(()) }
        })
        .await
        .unwrap();

        assert_eq!(count, 0);
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let items = [1, 2, 3, 4, 5, 6];
        let mut calls = 0;

        let result = process_chunks(&items, 2, |chunk| {
            calls += 1;
            let first = chunk[0];
            async move {
                if first == 3 {
                    Err(format!("chunk starting at {} failed", first))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert_eq!(result.unwrap_err(), "chunk starting at 3 failed");
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_zero_chunk_size_is_one() {
        let items = ["a", "b"];
        let mut calls = 0;

        process_chunks(&items, 0, |_| {
            calls += 1;
            async { Ok::<_, ()>(()) }
        })
        .await
        .unwrap();

        assert_eq!(calls, 2);
    }
}
