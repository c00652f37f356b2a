use std::cell::RefCell;
use std::rc::Rc;

use folio::visibility::{ChromeConfig, ChromeVisibility};

fn recorded() -> (ChromeVisibility, Rc<RefCell<Vec<(bool, bool)>>>) {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let mut chrome = ChromeVisibility::new(ChromeConfig::default(), 800.0);
    let sink = Rc::clone(&calls);
    chrome.set_listener(move |header, footer| sink.borrow_mut().push((header, footer)));
    (chrome, calls)
}

#[test]
fn header_hysteresis() {
    let (mut chrome, calls) = recorded();

    chrome.on_pointer_y(15.0);
    assert!(chrome.state().header_visible);
    chrome.on_pointer_y(22.0);
    assert!(chrome.state().header_visible);
    chrome.on_pointer_y(400.0);
    assert!(!chrome.state().header_visible);

    // Entering the hold band from below does not show the header.
    chrome.on_pointer_y(30.0);
    assert!(!chrome.state().header_visible);

    assert_eq!(*calls.borrow(), vec![(true, false), (false, false)]);
}

#[test]
fn footer_uses_distance_from_bottom() {
    let (mut chrome, _) = recorded();
    chrome.on_pointer_y(780.0);
    assert!(chrome.state().footer_visible);
    chrome.on_pointer_y(760.0);
    assert!(chrome.state().footer_visible);
    chrome.on_pointer_y(700.0);
    assert!(!chrome.state().footer_visible);
}

#[test]
fn pinning_overrides_pointer() {
    let (mut chrome, calls) = recorded();
    chrome.on_pointer_y(400.0);
    let state = chrome.toggle_pinned().unwrap();
    assert!(state.pinned && state.header_visible && state.footer_visible);

    chrome.on_pointer_y(500.0);
    assert!(chrome.pointer_left().is_none());
    assert!(chrome.state().header_visible);

    chrome.toggle_pinned();
    assert!(!chrome.state().header_visible);
    assert_eq!(*calls.borrow(), vec![(true, true), (false, false)]);
}
