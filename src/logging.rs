use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

const DEFAULT_FILTER: &str = "category_archiver=info,warn";

/// Installs the global fmt subscriber. Filter comes from `ARCHIVER_LOG`.
///
/// Progress goes to stdout unless stdout is reserved for a JSON report.
pub fn init(json_report: bool) {
    let filter =
        EnvFilter::try_from_env("ARCHIVER_LOG").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let writer = if json_report {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .try_init();
}
