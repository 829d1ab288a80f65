//! Markdown-to-HTML rendering with optional citation processing.
//!
//! Content is converted by an external document converter (pandoc). When both
//! a bibliography and a CSL style are available, citation processing is turned
//! on and a references heading is appended if the text actually cites
//! something. Otherwise citation markers pass through as literal text.

mod citations;
mod slug;

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, instrument};

use profsite_shared::{PandocConfig, ProfsiteError, Result};

pub use citations::{PREAMBLE, REFERENCES_HEADING};
pub use slug::slugify;

// ---------------------------------------------------------------------------
// Converter seam
// ---------------------------------------------------------------------------

/// Runs a markdown-to-HTML conversion with the given command-line arguments.
pub trait Converter {
    /// Convert `input` (fed on stdin) and return the produced HTML.
    fn convert(&self, input: &str, args: &[String]) -> Result<String>;
}

/// [`Converter`] backed by a pandoc executable.
#[derive(Debug, Clone)]
pub struct PandocConverter {
    binary: PathBuf,
}

impl PandocConverter {
    /// Use the executable at `binary` (looked up on `PATH` if not absolute).
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Build from the `[pandoc]` config section.
    pub fn from_config(config: &PandocConfig) -> Self {
        Self::new(&config.binary)
    }
}

impl Converter for PandocConverter {
    fn convert(&self, input: &str, args: &[String]) -> Result<String> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ProfsiteError::Conversion(format!(
                    "failed to spawn converter: {e}. Is `{}` installed?",
                    self.binary.display()
                ))
            })?;

        // Feed stdin from its own thread: a converter that streams output
        // while still reading would otherwise fill both pipes and hang.
        let mut stdin = child.stdin.take().ok_or_else(|| {
            ProfsiteError::Conversion("failed to capture converter stdin".into())
        })?;
        let input = input.to_owned();
        let writer = std::thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child
            .wait_with_output()
            .map_err(|e| ProfsiteError::Conversion(format!("failed to wait for converter: {e}")))?;
        let written = writer
            .join()
            .map_err(|_| ProfsiteError::Conversion("converter stdin writer panicked".into()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProfsiteError::Conversion(format!(
                "converter exited with status {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        // A converter that exits successfully without reading all input
        // closes the pipe early; only other write failures matter.
        match written {
            Err(e) if e.kind() != ErrorKind::BrokenPipe => {
                return Err(ProfsiteError::Conversion(format!(
                    "failed to write to converter stdin: {e}"
                )));
            }
            _ => {}
        }

        String::from_utf8(output.stdout)
            .map_err(|e| ProfsiteError::Conversion(format!("converter produced invalid UTF-8: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Converter input and arguments for one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    /// Markdown fed to the converter, preamble included.
    pub input: String,
    /// Converter arguments.
    pub args: Vec<String>,
    /// Whether citation processing is enabled.
    pub citations: bool,
}

/// Build the converter request for `content`.
///
/// Citation processing needs both `csl` and `bib`; an absent or empty path
/// on either side disables it.
pub fn prepare(content: &str, csl: Option<&Path>, bib: Option<&Path>) -> RenderRequest {
    let mut args: Vec<String> = ["--from", "markdown", "--to", "html5", "--mathjax"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let (csl, bib) = (non_empty(csl), non_empty(bib));
    let mut body = content.to_string();
    let citations = match (csl, bib) {
        (Some(csl), Some(bib)) => {
            args.push("--citeproc".into());
            args.push(format!("--bibliography={}", bib.display()));
            args.push(format!("--csl={}", csl.display()));
            if citations::has_citation_markers(content) {
                body = citations::with_references_heading(&body);
            }
            true
        }
        _ => false,
    };

    RenderRequest {
        input: citations::with_preamble(&body),
        args,
        citations,
    }
}

/// Render markdown `content` to HTML5.
///
/// Every call runs the converter; nothing is cached. Converter failures
/// propagate without a fallback.
#[instrument(skip(converter, content), fields(len = content.len()))]
pub fn render(
    converter: &impl Converter,
    content: &str,
    csl: Option<&Path>,
    bib: Option<&Path>,
) -> Result<String> {
    let request = prepare(content, csl, bib);
    debug!(
        citations = request.citations,
        args = request.args.len(),
        "invoking converter"
    );
    converter.convert(&request.input, &request.args)
}

fn non_empty(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records every call and echoes the input back wrapped in a div.
    #[derive(Default)]
    struct RecordingConverter {
        calls: RefCell<Vec<(String, Vec<String>)>>,
    }

    impl Converter for RecordingConverter {
        fn convert(&self, input: &str, args: &[String]) -> Result<String> {
            self.calls
                .borrow_mut()
                .push((input.to_string(), args.to_vec()));
            Ok(format!("<div>{input}</div>"))
        }
    }

    fn has_citeproc(args: &[String]) -> bool {
        args.iter().any(|a| a == "--citeproc")
    }

    #[test]
    fn plain_render_has_no_citation_flags() {
        let conv = RecordingConverter::default();
        let html = render(&conv, "Hello world", None, None).unwrap();

        let calls = conv.calls.borrow();
        let (input, args) = &calls[0];
        assert!(!has_citeproc(args));
        assert!(!args.iter().any(|a| a.starts_with("--bibliography")));
        assert!(!input.contains(REFERENCES_HEADING));
        assert!(!html.contains("References"));
        assert!(args.contains(&"--mathjax".to_string()));
        assert!(args.contains(&"html5".to_string()));
    }

    #[test]
    fn cited_content_gets_references_heading() {
        let conv = RecordingConverter::default();
        render(
            &conv,
            "See [@smith2020]",
            Some(Path::new("style.csl")),
            Some(Path::new("refs.bib")),
        )
        .unwrap();

        let calls = conv.calls.borrow();
        let (input, args) = &calls[0];
        assert!(input.ends_with("See [@smith2020]\n\n### References"));
        assert!(has_citeproc(args));
        assert!(args.contains(&"--bibliography=refs.bib".to_string()));
        assert!(args.contains(&"--csl=style.csl".to_string()));
    }

    #[test]
    fn uncited_content_keeps_flags_without_heading() {
        let conv = RecordingConverter::default();
        render(
            &conv,
            "No citations here",
            Some(Path::new("style.csl")),
            Some(Path::new("refs.bib")),
        )
        .unwrap();

        let calls = conv.calls.borrow();
        let (input, args) = &calls[0];
        assert!(has_citeproc(args));
        assert!(!input.contains(REFERENCES_HEADING));
    }

    #[test]
    fn one_missing_path_disables_citations() {
        let only_bib = prepare("See [@a]", None, Some(Path::new("refs.bib")));
        assert!(!only_bib.citations);
        assert!(!has_citeproc(&only_bib.args));
        assert!(only_bib.input.ends_with("See [@a]"));

        let empty_csl = prepare("See [@a]", Some(Path::new("")), Some(Path::new("refs.bib")));
        assert!(!empty_csl.citations);
    }

    #[test]
    fn preamble_is_always_prepended() {
        for req in [
            prepare("x", None, None),
            prepare("x", Some(Path::new("a.csl")), Some(Path::new("b.bib"))),
        ] {
            assert!(req.input.starts_with(PREAMBLE));
        }
    }

    #[test]
    fn repeated_render_is_identical_and_uncached() {
        let conv = RecordingConverter::default();
        let csl = Some(Path::new("style.csl"));
        let bib = Some(Path::new("refs.bib"));
        let first = render(&conv, "As @doe2019 shows", csl, bib).unwrap();
        let second = render(&conv, "As @doe2019 shows", csl, bib).unwrap();
        assert_eq!(first, second);
        assert_eq!(conv.calls.borrow().len(), 2);
    }

    #[test]
    fn missing_binary_is_conversion_error() {
        let conv = PandocConverter::new(format!(
            "/nonexistent/profsite-pandoc-{}",
            uuid::Uuid::now_v7()
        ));
        let err = render(&conv, "Hello", None, None).unwrap_err();
        assert!(matches!(err, ProfsiteError::Conversion(_)));
        assert!(err.to_string().contains("failed to spawn converter"));
    }

    /// Drives real subprocesses through stand-in converter scripts.
    /// Kept in one test so script writes never overlap another spawn.
    #[cfg(unix)]
    #[test]
    fn subprocess_plumbing() {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("profsite-pandoc-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();

        let write_script = |name: &str, body: &str| {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        };

        // Echo stdin back and record the arguments.
        let args_file = dir.join("args.txt");
        let echo = write_script(
            "echo-pandoc",
            &format!("printf '%s\\n' \"$@\" > '{}'\ncat", args_file.display()),
        );
        let conv = PandocConverter::new(&echo);
        let html = render(
            &conv,
            "See [@smith2020]",
            Some(Path::new("style.csl")),
            Some(Path::new("refs.bib")),
        )
        .unwrap();
        assert!(html.starts_with(PREAMBLE));
        assert!(html.ends_with("### References"));

        let recorded = std::fs::read_to_string(&args_file).unwrap();
        let recorded: Vec<&str> = recorded.lines().collect();
        assert_eq!(&recorded[..5], ["--from", "markdown", "--to", "html5", "--mathjax"]);
        assert!(recorded.contains(&"--citeproc"));

        // Nonzero exit propagates with stderr.
        let failing = write_script("failing-pandoc", "cat > /dev/null\necho 'bad yaml' >&2\nexit 3");
        let err = render(&PandocConverter::new(&failing), "x", None, None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("status 3"), "{msg}");
        assert!(msg.contains("bad yaml"), "{msg}");

        // Output streams back while input is still being written.
        let cat = write_script("cat-pandoc", "cat");
        let big = "word ".repeat(100_000);
        let html = render(&PandocConverter::new(&cat), &big, None, None).unwrap();
        assert!(html.len() > 64 * 1024);
        assert!(html.ends_with(&big));

        // Exits before reading a large input: status and stderr still surface.
        let early = write_script("early-exit-pandoc", "echo 'Unknown option --citeproc' >&2\nexit 2");
        let err = render(&PandocConverter::new(&early), &big, None, None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("status 2"), "{msg}");
        assert!(msg.contains("Unknown option --citeproc"), "{msg}");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
