use std::path::Path;
use std::process::{Command, Stdio};

fn write(root: &Path, rel: &str, body: &str) {
    let p = root.join(rel);
    std::fs::create_dir_all(p.parent().expect("parent dir")).expect("create dirs");
    std::fs::write(p, body).expect("write fixture");
}

const NEEDS_MIGRATION: &str = "import { render } from '@testing-library/react';

test('greets', () => {
  const { getByText } = render(<Hello />);
  expect(getByText('hi')).toBeTruthy();
});
";

#[test]
fn cli_smoke() {
    // `cargo test` sets this for integration tests.
    let bin = env!("CARGO_BIN_EXE_screenify");
    let tmp = tempfile::TempDir::new().expect("tempdir");
    let root = tmp.path();

    write(root, "src/Hello.test.tsx", NEEDS_MIGRATION);
    write(root, "src/Hello.tsx", "export const Hello = () => <p>{getByText()}</p>;\n");
    write(root, "src/Other.spec.ts", "it('noop', () => {});\n");
    write(root, "node_modules/pkg/x.test.js", "getByText('x');\n");

    // --check: reports, writes nothing, exits 1.
    let check = Command::new(bin)
        .args(["--check", "--json"])
        .current_dir(root)
        .stderr(Stdio::null())
        .output()
        .expect("run screenify --check");
    assert_eq!(check.status.code(), Some(1), "check should fail when files would change");
    let summary: serde_json::Value = serde_json::from_slice(&check.stdout).expect("stdout is json");
    assert_eq!(summary["scanned"], 2);
    assert_eq!(summary["unchanged"], 1);
    let changed = summary["changed"].as_array().expect("changed array");
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0]["path"], "src/Hello.test.tsx");
    assert_eq!(changed[0]["report"]["import"], "extended");
    assert_eq!(
        std::fs::read_to_string(root.join("src/Hello.test.tsx")).expect("read"),
        NEEDS_MIGRATION
    );

    // default mode rewrites in place.
    let status = Command::new(bin)
        .arg("--quiet")
        .current_dir(root)
        .status()
        .expect("run screenify");
    assert!(status.success(), "write run should succeed");
    let migrated = std::fs::read_to_string(root.join("src/Hello.test.tsx")).expect("read");
    assert_eq!(
        migrated,
        "import { render, screen } from '@testing-library/react';

test('greets', () => {
  render(<Hello />);
  expect(screen.getByText('hi')).toBeTruthy();
});
"
    );

    // non-test and ignored files untouched.
    assert!(std::fs::read_to_string(root.join("src/Hello.tsx"))
        .expect("read")
        .contains("{getByText()}"));
    assert_eq!(
        std::fs::read_to_string(root.join("node_modules/pkg/x.test.js")).expect("read"),
        "getByText('x');\n"
    );

    // a second run is a no-op.
    let again = Command::new(bin)
        .args(["--check", "--quiet"])
        .current_dir(root)
        .status()
        .expect("run screenify again");
    assert!(again.success(), "second run should find nothing to change");
}

#[test]
fn cli_reports_parse_failures() {
    let bin = env!("CARGO_BIN_EXE_screenify");
    let tmp = tempfile::TempDir::new().expect("tempdir");
    write(tmp.path(), "broken.test.ts", "getByText('x'\n");

    let out = Command::new(bin)
        .args(["--dry-run", "broken.test.ts"])
        .current_dir(tmp.path())
        .output()
        .expect("run screenify");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("failed broken.test.ts"), "stderr: {stderr}");
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("broken.test.ts")).expect("read"),
        "getByText('x'\n"
    );
}
