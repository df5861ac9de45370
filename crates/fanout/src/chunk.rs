//! Input partitioning for chunked dispatch.

/// Chunk size targeting roughly four chunks per worker.
///
/// Returns 0 for empty input, which [`chunk`] turns into "nothing to run".
pub fn auto_chunk_size(len: usize, pool_size: usize) -> usize {
    if len == 0 {
        return 0;
    }
    len.div_ceil(4 * pool_size.max(1))
}

/// Split `items` into consecutive groups of `size`, keeping input order.
///
/// The last group holds the remainder. A size of 0 yields no groups.
pub fn chunk<T>(items: impl IntoIterator<Item = T>, size: usize) -> Vec<Vec<T>> {
    if size == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = Vec::with_capacity(size);
    for item in items {
        current.push(item);
        if current.len() == size {
            chunks.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
