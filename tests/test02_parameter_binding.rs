use std::ffi::OsString;
use std::io::Cursor;

use rusqlite::Connection;
use sqlpipe::{Layout, OutputOptions, Session, SqError};

fn session(args: &[&str]) -> Result<Session<Vec<u8>>, Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let args: Vec<OsString> = args.iter().map(OsString::from).collect();
    let options = OutputOptions::default().with_layout(Layout::Separated(vec!["|".into()]));
    Ok(Session::with_options(conn, options, args, Vec::new()))
}

fn output(session: Session<Vec<u8>>) -> Result<String, Box<dyn std::error::Error>> {
    Ok(String::from_utf8(session.close()?)?)
}

#[test]
fn positional_arguments_continue_across_statements() -> Result<(), Box<dyn std::error::Error>> {
    let mut s = session(&["1", "two", "3"])?;
    s.run_script("select ?, :name; select ?")?;
    assert_eq!(output(s)?, "1|two\n3\n");
    Ok(())
}

#[test]
fn numbered_markers_share_one_argument() -> Result<(), Box<dyn std::error::Error>> {
    let mut s = session(&["x", "y"])?;
    s.run_script("select ?1, ?1, ?2")?;
    assert_eq!(output(s)?, "x|x|y\n");
    Ok(())
}

#[test]
fn missing_argument_aborts() -> Result<(), Box<dyn std::error::Error>> {
    let mut s = session(&["only"])?;
    let err = s.run_script("select ?, ?").unwrap_err();
    assert!(matches!(err, SqError::Usage(_)), "{err}");
    assert_eq!(err.exit_code(), 1);
    Ok(())
}

#[test]
fn environment_markers_read_variables() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::var("PATH")?;
    let mut s = session(&[])?;
    s.run_script("select $PATH = $PATH, typeof($SQLPIPE_MISSING_VAR)")?;
    assert!(!path.is_empty());
    assert_eq!(output(s)?, "1|null\n");
    Ok(())
}

#[test]
fn unset_environment_variable_binds_null() -> Result<(), Box<dyn std::error::Error>> {
    let mut s = session(&[])?;
    s.run_script("select coalesce($MISSING_VAR_FOR_SQLPIPE_TESTS, 'was null')")?;
    assert_eq!(output(s)?, "was null\n");
    Ok(())
}

#[test]
fn fixed_length_descriptor_read_ignores_whitespace() -> Result<(), Box<dyn std::error::Error>> {
    let mut s = session(&[])?;
    s.descriptors_mut()
        .attach(0, Box::new(Cursor::new(b"a b\ncdef".to_vec())));
    s.run_script("select hex(:fd0_5), typeof(:fd0_5)")?;
    assert_eq!(output(s)?, "6120620A63|blob\n");
    Ok(())
}

#[test]
fn disambiguated_markers_read_successive_fields() -> Result<(), Box<dyn std::error::Error>> {
    let mut s = session(&[])?;
    s.descriptors_mut()
        .attach(0, Box::new(Cursor::new(b"first\nsecond\nthird\n".to_vec())));
    s.run_script(
        "select cast(:fd0__10_a as text), cast(:fd0__10_b as text); \
         select cast(:fd0__10 as text)",
    )?;
    assert_eq!(output(s)?, "first|second\nthird\n");
    Ok(())
}

#[test]
fn trimmed_whitespace_fields() -> Result<(), Box<dyn std::error::Error>> {
    let mut s = session(&[])?;
    s.descriptors_mut()
        .attach(4, Box::new(Cursor::new(b"  padded  \n".to_vec())));
    s.run_script("select '[' || cast(:fd4_t_10 as text) || ']'")?;
    assert_eq!(output(s)?, "[padded]\n");
    Ok(())
}

#[test]
fn whole_stream_is_one_blob() -> Result<(), Box<dyn std::error::Error>> {
    let mut s = session(&[])?;
    let data: Vec<u8> = (0..=255u8).cycle().take(100_000).collect();
    s.descriptors_mut().attach(0, Box::new(Cursor::new(data)));
    s.run_script("create table b(v blob); insert into b values (:fd0); select length(v), hex(substr(v, 256, 2)) from b")?;
    assert_eq!(output(s)?, "100000|FF00\n");
    Ok(())
}

#[test]
fn malformed_descriptor_marker_aborts() -> Result<(), Box<dyn std::error::Error>> {
    let mut s = session(&[])?;
    let err = s.run_script("select :fd0__300").unwrap_err();
    assert!(matches!(err, SqError::MalformedMarker { .. }), "{err}");
    assert_eq!(err.exit_code(), 255);
    Ok(())
}

#[test]
fn names_resembling_descriptors_are_positional() -> Result<(), Box<dyn std::error::Error>> {
    let mut s = session(&["arg"])?;
    s.run_script("select :fdate")?;
    assert_eq!(output(s)?, "arg\n");
    Ok(())
}
