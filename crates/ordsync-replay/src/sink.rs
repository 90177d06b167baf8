//! Change sink that writes one JSON object per event

use ordsync_common::{Change, ChangeSink, EntryStore, FetchError};
use serde::Serialize;
use std::io::Write;
use tracing::warn;

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum FailureEvent<'a> {
    FetchFailed { id: &'a str, error: String },
    ReloadFailed { error: String },
}

#[derive(Serialize)]
struct FinalEvent<'a> {
    #[serde(rename = "final")]
    order: &'a [String],
}

/// Writes every change and failure to `W` as JSON lines
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    out: W,
    pretty: bool,
    events: usize,
    write_errors: usize,
}

impl<W: Write> JsonLinesSink<W> {
    /// Creates a sink writing compact JSON lines to `out`
    pub fn new(out: W) -> Self {
        Self {
            out,
            pretty: false,
            events: 0,
            write_errors: 0,
        }
    }

    /// Pretty-print each event (one object per block instead of per line)
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Number of events written so far, the final line excluded
    pub fn events(&self) -> usize {
        self.events
    }

    /// Number of events lost because encoding or writing failed
    pub fn write_errors(&self) -> usize {
        self.write_errors
    }

    /// Writes the closing `{"final": [...]}` line
    pub fn write_final(&mut self, order: &[String]) -> std::io::Result<()> {
        let line = self.encode(&FinalEvent { order })?;
        writeln!(self.out, "{}", line)?;
        self.out.flush()
    }

    /// Consumes the sink, returning the underlying writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn encode<E: Serialize>(&self, event: &E) -> serde_json::Result<String> {
        if self.pretty {
            serde_json::to_string_pretty(event)
        } else {
            serde_json::to_string(event)
        }
    }

    fn write_event<E: Serialize>(&mut self, event: &E) {
        let written = self
            .encode(event)
            .map_err(std::io::Error::from)
            .and_then(|line| writeln!(self.out, "{}", line));
        match written {
            Ok(()) => self.events += 1,
            Err(e) => {
                self.write_errors += 1;
                warn!(error = %e, "failed to write event");
            }
        }
    }
}

impl<W, T> ChangeSink<String, T> for JsonLinesSink<W>
where
    W: Write + Send,
{
    fn on_change(&mut self, change: &Change<String>, _store: &EntryStore<String, T>) {
        self.write_event(change);
    }

    fn on_fetch_failed(&mut self, id: &String, error: &FetchError) {
        self.write_event(&FailureEvent::FetchFailed {
            id,
            error: error.to_string(),
        });
    }

    fn on_reload_failed(&mut self, error: &FetchError) {
        self.write_event(&FailureEvent::ReloadFailed {
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(sink: JsonLinesSink<Vec<u8>>) -> Vec<String> {
        String::from_utf8(sink.into_inner())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_changes_as_json_lines() {
        let store: EntryStore<String, ()> = EntryStore::new();
        let mut sink = JsonLinesSink::new(Vec::new());

        sink.on_change(
            &Change::Insert {
                index: 0,
                id: "a".to_string(),
            },
            &store,
        );
        sink.on_change(
            &Change::Move {
                from: 0,
                to: 2,
                id: "a".to_string(),
            },
            &store,
        );
        ChangeSink::<String, ()>::on_fetch_failed(
            &mut sink,
            &"b".to_string(),
            &FetchError::not_found(&"b"),
        );
        sink.write_final(&["a".to_string()]).unwrap();

        assert_eq!(sink.events(), 3);
        assert_eq!(
            lines(sink),
            vec![
                r#"{"op":"insert","index":0,"id":"a"}"#,
                r#"{"op":"move","from":0,"to":2,"id":"a"}"#,
                r#"{"op":"fetch_failed","id":"b","error":"Item \"b\" not found"}"#,
                r#"{"final":["a"]}"#,
            ]
        );
    }

    #[test]
    fn test_pretty_output_spans_lines() {
        let store: EntryStore<String, ()> = EntryStore::new();
        let mut sink = JsonLinesSink::new(Vec::new()).with_pretty(true);

        sink.on_change(&Change::ReplaceAll { len: 3 }, &store);

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(text.lines().count() > 1);
        assert!(text.contains("\"op\": \"replace_all\""));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_errors_are_counted() {
        let store: EntryStore<String, ()> = EntryStore::new();
        let mut sink = JsonLinesSink::new(BrokenPipe);

        sink.on_change(&Change::ReplaceAll { len: 1 }, &store);
        ChangeSink::<String, ()>::on_reload_failed(&mut sink, &FetchError::unavailable("offline"));

        assert_eq!(sink.events(), 0);
        assert_eq!(sink.write_errors(), 2);
        assert!(sink.write_final(&[]).is_err());
    }
}
