/// Retries an async expression until it yields `Ok` or `$times` attempts have
/// been made, doubling the delay (in milliseconds) after each failure.
#[macro_export]
macro_rules! retry_async {
    ($times:expr, $delay:expr, $func:expr) => {{
        let mut attempts = 0;
        let mut delay: u64 = $delay;

        let result = loop {
            attempts += 1;
            let res = $func.await;

            if res.is_ok() || attempts >= $times {
                break res;
            } else {
                tracing::debug!("attempt {} failed, retrying in {}ms", attempts, delay);
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                delay *= 2; // Exponential backoff
            }
        };

        result
    }};
}
