use std::cell::RefCell;
use std::rc::Rc;

use crate::data::{RegisterType, RegisterUnit};
use crate::pdu::ExceptionCode;
use crate::reply::{Reply, ReplyError, ReplyEvent};

fn reply_with_log(server_address: u8) -> (Reply, Rc<RefCell<Vec<ReplyEvent>>>) {
    let events = Rc::new(RefCell::new(Vec::new()));
    let mut reply = Reply::new(server_address);
    let sink = Rc::clone(&events);
    reply.set_notifier(move |event| sink.borrow_mut().push(event));
    (reply, events)
}

fn finished_count(events: &RefCell<Vec<ReplyEvent>>) -> usize {
    events
        .borrow()
        .iter()
        .filter(|event| matches!(event, ReplyEvent::Finished))
        .count()
}

fn error_count(events: &RefCell<Vec<ReplyEvent>>) -> usize {
    events
        .borrow()
        .iter()
        .filter(|event| matches!(event, ReplyEvent::ErrorOccurred(_)))
        .count()
}

#[test]
fn test_new_reply_is_pending() {
    let reply = Reply::new(1);
    assert_eq!(reply.server_address(), 1);
    assert!(!reply.is_finished());
    assert!(!reply.result().is_valid());
    assert_eq!(reply.result().start_address(), -1);
    assert_eq!(reply.error(), ReplyError::NoError);
    assert_eq!(reply.protocol_error(), ExceptionCode::ExtendedException);
    assert_eq!(reply.error_text(), "");
}

#[test]
fn test_set_finished_fires_once() {
    let (mut reply, events) = reply_with_log(1);

    reply.set_finished(true);
    assert!(reply.is_finished());
    assert_eq!(finished_count(&events), 1);

    reply.set_finished(true);
    assert_eq!(finished_count(&events), 1);

    // finishing is monotonic; false never resets
    reply.set_finished(false);
    assert!(reply.is_finished());
    assert_eq!(finished_count(&events), 1);
    assert_eq!(error_count(&events), 0);
}

#[test]
fn test_set_finished_false_while_pending() {
    let (mut reply, events) = reply_with_log(1);
    reply.set_finished(false);
    assert!(!reply.is_finished());
    assert!(events.borrow().is_empty());
}

#[test]
fn test_set_result_while_pending() {
    let (mut reply, events) = reply_with_log(1);
    let unit = RegisterUnit::new(RegisterType::Coils, 5, vec![4, 5, 6]);

    reply.set_result(unit.clone());
    assert!(events.borrow().is_empty());
    assert!(!reply.is_finished());
    assert_eq!(reply.result(), &unit);
    assert_eq!(reply.result().value_count(), 3);

    // updates stay possible until finished; completion is separate
    let update = RegisterUnit::new(RegisterType::Coils, 5, vec![1]);
    reply.set_result(update.clone());
    assert_eq!(reply.result(), &update);
}

#[test]
fn test_set_result_ignored_after_finished() {
    let (mut reply, _events) = reply_with_log(1);
    reply.set_finished(true);
    reply.set_result(RegisterUnit::new(RegisterType::Coils, 5, vec![1]));
    assert!(!reply.result().is_valid());
}

#[test]
fn test_set_error_forces_finish() {
    let (mut reply, events) = reply_with_log(1);

    reply.set_error(ReplyError::TimeoutError, "timed out");
    assert!(reply.is_finished());
    assert_eq!(reply.error(), ReplyError::TimeoutError);
    assert_eq!(reply.error_text(), "timed out");
    assert_eq!(reply.protocol_error(), ExceptionCode::ExtendedException);
    assert_eq!(error_count(&events), 1);
    assert_eq!(finished_count(&events), 1);
    assert_eq!(
        events.borrow().as_slice(),
        &[
            ReplyEvent::ErrorOccurred(ReplyError::TimeoutError),
            ReplyEvent::Finished
        ]
    );
}

#[test]
fn test_set_error_is_not_deduplicated() {
    let (mut reply, events) = reply_with_log(1);

    reply.set_error(ReplyError::ReplyAbortedError, "aborted");
    reply.set_error(ReplyError::ReplyAbortedError, "aborted");
    assert_eq!(error_count(&events), 2);
    assert_eq!(finished_count(&events), 2);

    // the redundant plain finish stays deduplicated even after errors
    reply.set_finished(true);
    assert_eq!(finished_count(&events), 2);
}

#[test]
fn test_set_protocol_error() {
    let (mut reply, events) = reply_with_log(1);

    reply.set_protocol_error(ExceptionCode::IllegalFunction, "illegal function");
    assert!(reply.is_finished());
    assert_eq!(reply.error(), ReplyError::ProtocolError);
    assert_eq!(reply.protocol_error(), ExceptionCode::IllegalFunction);
    assert_eq!(reply.error_text(), "illegal function");
    assert_eq!(
        events.borrow().as_slice(),
        &[
            ReplyEvent::ErrorOccurred(ReplyError::ProtocolError),
            ReplyEvent::Finished
        ]
    );

    reply.set_protocol_error(ExceptionCode::IllegalFunction, "again");
    assert_eq!(error_count(&events), 2);
    assert_eq!(finished_count(&events), 2);
}
