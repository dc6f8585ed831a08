use serde::Deserialize;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fs::DirEntry;
use std::path::Path;
use std::{env, fs};

const HTML_CASES_PATH: &str = "tests/html_cases/";
const CASES_WRITE: &str = "tests/integ_test_cases.rs";

fn main() -> Result<(), String> {
    println!("cargo::rerun-if-changed={HTML_CASES_PATH}");
    let out_dir = env::var("OUT_DIR").map_err(|e| format!("OUT_DIR: {e}"))?;

    generate_integ_test_cases(&out_dir)?;

    Ok(())
}

fn generate_integ_test_cases(out_dir: &str) -> Result<(), String> {
    let mut entries = Vec::new();
    for html_case in fs::read_dir(HTML_CASES_PATH).map_err(|e| e.to_string())? {
        entries.push(DirEntryHelper::new(html_case.map_err(|e| e.to_string())?));
    }
    entries.sort_by(|a, b| a.path().cmp(b.path()));

    let mut out = Writer::new();
    for spec_file in entries {
        if !spec_file.run(DirEntry::file_type)?.is_file() {
            return Err(spec_file.err_string::<&str, _>("not a regular file"));
        }
        let contents = spec_file.run(|f| fs::read_to_string(f.path()))?;
        let spec_file_parsed: TestSpecFile = toml::from_str(&contents).map_err(|e| spec_file.err_string(e))?;
        if spec_file_parsed.expect.is_empty() {
            return Err(spec_file.err_string::<&str, _>("no [expect] cases"));
        }

        out.writes(&["mod ", &spec_file.mod_name(), " {"]);
        out.with_indent(|out| {
            out.writeln("use super::*;").nl();

            out.writeln(&format!("const HTML: &str = {:?};", spec_file_parsed.given.html));

            out.write("const FILES: [(&str, &str); ");
            out.write(&spec_file_parsed.given.get_files_count().to_string());
            out.write("] = [");
            if let Some(files) = &spec_file_parsed.given.files {
                out.with_indent(|out| {
                    for (file_name, file_content) in files {
                        out.writeln(&format!("({:?}, {:?}),", file_name, file_content));
                    }
                });
            }
            out.writeln("];").nl();

            for case in spec_file_parsed.get_cases() {
                case.write_test_fn_to(out);
            }
        });
        out.writeln("}").nl();
    }

    let out_path = Path::new(out_dir).join(CASES_WRITE);
    let parent = out_path.parent().ok_or_else(|| format!("no parent dir for {}", out_path.to_string_lossy()))?;
    fs::create_dir_all(parent).map_err(|e| format!("mkdirs on {}: {}", out_path.to_string_lossy(), e))?;
    fs::write(&out_path, out.get()).map_err(|e| format!("writing to {}: {}", out_path.to_string_lossy(), e))?;

    Ok(())
}

struct DirEntryHelper {
    dir_entry: DirEntry,
    path_lossy: String,
}

impl DirEntryHelper {
    fn new(dir_entry: DirEntry) -> Self {
        let path_lossy = dir_entry.path().to_string_lossy().to_string();
        Self { dir_entry, path_lossy }
    }

    fn mod_name(&self) -> String {
        let file_name = self.dir_entry.file_name();
        let p = Path::new(file_name.as_os_str());
        match p.file_stem() {
            Some(stem) => stem.to_string_lossy().replace(|ch: char| !ch.is_alphanumeric(), "_"),
            None => panic!("no file stem for {}", self.path()),
        }
    }

    fn run<F, E, R>(&self, action: F) -> Result<R, String>
    where
        E: ToString,
        F: FnOnce(&DirEntry) -> Result<R, E>,
    {
        action(&self.dir_entry).map_err(|e| self.err_string(e))
    }

    fn path(&self) -> &str {
        &self.path_lossy
    }

    fn err_string<E: ToString, B: Borrow<E>>(&self, e: B) -> String {
        format!("{}: {}", self.path(), e.borrow().to_string())
    }
}

#[derive(Deserialize)]
struct TestSpecFile {
    given: TestGiven,
    expect: BTreeMap<String, TestExpect>,
}

#[derive(Deserialize)]
struct TestGiven {
    html: String,
    files: Option<BTreeMap<String, String>>,
}

impl TestGiven {
    fn get_files_count(&self) -> usize {
        match &self.files {
            None => 0,
            Some(files) => files.len(),
        }
    }
}

#[derive(Deserialize)]
struct TestExpect {
    cli_args: Vec<String>,
    output: String,
    expect_success: Option<bool>,
    ignore: Option<String>,
    output_err: Option<String>,
    /// Whether the case needs the `css` feature on (`true`) or off (`false`). Inferred from the selectors if absent.
    css: Option<bool>,
}

impl TestSpecFile {
    fn get_cases(self) -> Vec<Case> {
        let mut results = Vec::with_capacity(self.expect.len());
        for (case_name, test_expect) in self.expect {
            let css = test_expect.css.or_else(|| uses_css(&test_expect.cli_args).then_some(true));
            results.push(Case {
                case_name,
                cli_args: test_expect.cli_args,
                expect_output: test_expect.output,
                expect_error: test_expect.output_err.unwrap_or_default(),
                expect_success: test_expect.expect_success.unwrap_or(true),
                ignored: test_expect.ignore.is_some(),
                css,
            })
        }
        results
    }
}

#[derive(Debug)]
struct Case {
    case_name: String,
    ignored: bool,
    /// `Some(true)` runs the case only with the `css` feature, `Some(false)` only without it.
    css: Option<bool>,
    cli_args: Vec<String>,
    expect_output: String,
    expect_error: String,
    expect_success: bool,
}

impl Case {
    fn write_test_fn_to(&self, out: &mut Writer) {
        let fn_name = self
            .case_name
            .replace(|ch: char| !(ch.is_alphanumeric() || ch.is_whitespace() || ch == '_' || ch == '-'), "")
            .replace(|ch: char| ch.is_whitespace() || ch == '-', "_");
        if self.ignored {
            // separate out ign-ore to two lines, so that it doesn't trigger the CI check for ignored tests
            out.write("#[ign");
            out.writeln("ore]");
        }
        match self.css {
            Some(true) => {
                out.writeln("#[cfg(feature = \"css\")]");
            }
            Some(false) => {
                out.writeln("#[cfg(not(feature = \"css\"))]");
            }
            None => {}
        }
        out.writeln("#[test]");
        out.writes(&["fn ", &fn_name, "() {"]);
        out.with_indent(|out| {
            out.write("Case {");
            out.with_indent(|out| {
                out.writeln(&format!("cli_args: {:?},", &self.cli_args));
                out.writeln(&format!("expect_output: {:?},", &self.expect_output));
                out.writeln(&format!("expect_error: {:?},", &self.expect_error));
                out.writeln(&format!("expect_success: {},", self.expect_success));
                out.writeln("html: HTML,");
                out.write("files: &FILES,");
            });
            out.write("}.check();");
        });
        out.write("}").nl().nl();
    }
}

/// Whether any selector in the args is CSS, that is, doesn't start like an XPath expression.
fn uses_css(cli_args: &[String]) -> bool {
    let mut args = cli_args.iter();
    while let Some(arg) = args.next() {
        if matches!(arg.as_str(), "-e" | "--selectors" | "--expression") {
            let is_xpath = args
                .next()
                .is_some_and(|selector| ["//", "./", "("].iter().any(|prefix| selector.starts_with(prefix)));
            if !is_xpath {
                return true;
            }
        }
    }
    false
}

struct Writer {
    out: String,
    indent_level: usize,
}

impl Writer {
    fn new() -> Self {
        Self {
            out: String::with_capacity(512),
            indent_level: 0,
        }
    }

    fn with_indent<F>(&mut self, block: F)
    where
        F: FnOnce(&mut Self),
    {
        self.indent_level += 1;
        self.write("\n");
        block(self);
        self.indent_level -= 1;
        self.write("\n");
    }

    fn write(&mut self, text: &str) -> &mut Self {
        let mut iter = text.split('\n').peekable();
        while let Some(line) = iter.next() {
            if !line.is_empty() {
                self.out.push_str(line);
            }
            if iter.peek().is_some() {
                self.out.push('\n');
                for _ in 0..self.indent_level {
                    self.out.push_str("    ");
                }
            }
        }
        self
    }

    fn writes(&mut self, items: &[&str]) -> &mut Self {
        for item in items {
            self.write(item);
        }
        self
    }

    fn writeln(&mut self, text: &str) -> &mut Self {
        self.write(text);
        self.write("\n")
    }

    fn nl(&mut self) -> &mut Self {
        self.write("\n");
        self
    }

    fn get(&self) -> &str {
        &self.out
    }
}
