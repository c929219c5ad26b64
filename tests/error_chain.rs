//! Error construction seen from a caller outside the crate.

use sense_backend::errors::{self, ErrChain, ErrorType, Leaf, ResultExt};

fn top_function(err: &(dyn std::error::Error + 'static)) -> String {
    errors::stack_frames(err)
        .first()
        .and_then(|frames| frames.resolve().into_iter().next())
        .map(|frame| frame.function)
        .unwrap_or_default()
}

#[inline(never)]
fn read_resort() -> Result<(), Leaf> {
    Err(Leaf::new("resort file missing"))
}

#[test]
fn test_first_frame_is_the_caller() {
    let err = errors::new("x");
    let top = top_function(&err);
    assert!(top.ends_with("test_first_frame_is_the_caller"), "got {top}");
}

#[test]
fn test_result_with_stack_records_call_site() {
    let err = read_resort().with_stack().unwrap_err();
    let top = top_function(&err);
    assert!(top.ends_with("test_result_with_stack_records_call_site"), "got {top}");
    assert_eq!(errors::root_cause(&err).to_string(), "resort file missing");
}

#[test]
fn test_chain_rendering_and_classification() {
    let err = ErrChain::new("insert resort")
        .with_cause(Leaf::new("duplicate key"))
        .with_type(ErrorType::AlreadyRegistered)
        .set_field("name", "aspen");
    assert_eq!(
        err.to_string(),
        "insert resort because {duplicate key} with Fields {map[name:aspen]}"
    );
    assert_eq!(errors::type_of(&err), Some(ErrorType::AlreadyRegistered));
    assert!(!errors::has_stack(&err));

    let ensured = errors::ensure_stack(err);
    assert!(errors::has_stack(ensured.as_ref()));
    assert_eq!(errors::type_of(ensured.as_ref()), None);
}

#[test]
fn test_stack_rendering_lists_frames() {
    let err = errors::wrap(Leaf::new("disk full"), "saving upload");
    let rendered = err.to_string();
    assert!(rendered.starts_with("saving upload: stack\n\t"), "got {rendered}");
    assert!(rendered.contains("error_chain.rs:"), "got {rendered}");
    assert!(rendered.ends_with(": disk full"));
}
