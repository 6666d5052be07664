use time::macros::format_description;
use tracing_subscriber::fmt::time::{FormatTime, UtcTime};
use tracing_subscriber::EnvFilter;

/// UTC wall-clock timestamps. Local-offset lookup fails once the fetch
/// pool has spawned threads, so the local timer would print `<unknown time>`.
pub fn log_timer() -> impl FormatTime {
    UtcTime::new(format_description!(
        "[hour]:[minute]:[second].[subsecond digits:3]Z"
    ))
}

/// Installs the global subscriber. `RUST_LOG` wins when set.
pub fn setup_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(log_timer())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn format_number(num: usize) -> String {
    let digits = num.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn validate_args(args: &crate::args::Args) -> anyhow::Result<()> {
    if args.limit == Some(0) {
        anyhow::bail!("--limit must be greater than 0");
    }

    if args.workers == Some(0) {
        anyhow::bail!("--workers must be greater than 0");
    }

    if args.timeout == 0 {
        anyhow::bail!("--timeout must be greater than 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use tracing_subscriber::fmt::format::Writer;

    #[test]
    fn timer_formats_while_other_threads_run() {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let worker = thread::spawn(move || stop_rx.recv().ok());

        let mut stamp = String::new();
        let result = log_timer().format_time(&mut Writer::new(&mut stamp));

        stop_tx.send(()).unwrap();
        worker.join().unwrap();

        assert!(result.is_ok());
        assert_eq!(stamp.len(), "12:34:56.789Z".len());
        assert!(stamp.ends_with('Z'));
    }

    #[test]
    fn formats_thousands() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(300000), "300,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }
}
