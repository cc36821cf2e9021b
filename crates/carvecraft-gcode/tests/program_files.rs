use carvecraft_gcode::{parse_program, Program, SAMPLE_PROGRAM};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_save_and_load_preserves_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("square.nc");

    let program = Program::sample();
    program.save(&path).unwrap();

    let loaded = Program::load(&path).unwrap();
    assert_eq!(loaded.text(), SAMPLE_PROGRAM);
    assert_eq!(loaded.commands(), program.commands());
}

#[test]
fn test_load_keeps_malformed_lines_as_no_ops() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "G0 X1\nG1 X(oops\nG1 X2").unwrap();

    let program = Program::load(file.path()).unwrap();
    assert_eq!(program.lines().len(), 3);
    assert_eq!(program.warnings().len(), 1);
    assert_eq!(program.warnings()[0].line_number, 2);
    assert_eq!(program.commands(), vec!["G0 X1", "G1 X2"]);
}

#[test]
fn test_windows_line_endings() {
    let program = parse_program("G0 X1\r\n; c\r\nG1 Y2\r\n");
    assert_eq!(program.commands(), vec!["G0 X1", "G1 Y2"]);
    assert_eq!(program.lines[1].raw, "; c");
}
