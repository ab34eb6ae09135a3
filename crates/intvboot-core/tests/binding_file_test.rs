// Intvboot Binding File Tests
//
// Compile binding tables from on-disk keyboard map files.
//
// Run with: cargo test -p intvboot-core --test binding_file_test

use std::io::Write;
use std::time::{Duration, Instant};

use intvboot_core::action::{ActionRegistry, Target, EMU_RESET};
use intvboot_core::combo::ComboError;
use intvboot_core::config::{compile, BindingError, DslErrorKind};
use intvboot_core::key::key_from_name;
use intvboot_core::mapping::{default_bindings, KeyBindingEntry, MapIndex};
use intvboot_core::transform::InputRouter;
use intvboot_core::{KeyId, Session, Settings, StockFactory};

fn key(name: &str) -> KeyId {
    key_from_name(name).unwrap()
}

fn map(n: usize) -> MapIndex {
    MapIndex::new(n).unwrap()
}

fn kbd_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_n_lines_yield_n_entries() {
    let file = kbd_file(
        "; right controller on the letter keys\r\n\
         MAP 1\r\n\
         Q PD0R_KP1\r\n\
         W PD0R_KP2\r\n\
         E PD0R_KP3\r\n\
         SPACE PD0R_A_T ; fire\r\n",
    );
    let table = compile(ActionRegistry::builtin(), &[], Some(file.path())).unwrap();

    assert_eq!(table.len_in_map(map(1)), 4);
    assert_eq!(table.len(), 4);

    let registry = ActionRegistry::builtin();
    let expected_bindings = [
        ("Q", "PD0R_KP1"),
        ("W", "PD0R_KP2"),
        ("E", "PD0R_KP3"),
        ("SPACE", "PD0R_A_T"),
    ];
    for (k, action) in expected_bindings {
        let binding = table.get(key(k), map(1)).unwrap();
        let expected = registry.get(registry.lookup(action).unwrap()).unwrap();
        assert_eq!(binding.target, expected.target);
        assert_eq!(binding.and_mask, expected.and_mask);
        assert_eq!(binding.or_mask, expected.or_mask);
    }
}

#[test]
fn test_file_overrides_defaults() {
    let file = kbd_file("F1 RESET\n");
    let table = compile(ActionRegistry::builtin(), &default_bindings(), Some(file.path())).unwrap();

    let f1 = table.get(key("F1"), MapIndex::DEFAULT).unwrap();
    assert_eq!(f1.target, Target::Emu);
    assert_eq!(f1.or_mask, EMU_RESET);
    // Other maps keep the default.
    assert_ne!(table.get(key("F1"), map(1)).unwrap().or_mask, EMU_RESET);
}

#[test]
fn test_duplicate_combo_fails() {
    let file = kbd_file("ADD_COMBO 5 A B\nADD_COMBO 5 C D\n");
    let err = compile(ActionRegistry::builtin(), &[], Some(file.path())).unwrap_err();
    match err {
        BindingError::Syntax { line, kind, .. } => {
            assert_eq!(line, 2);
            assert_eq!(kind, DslErrorKind::Combo(ComboError::Duplicate(5)));
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_combo_delay_bounds() {
    let file = kbd_file("COMBO_DELAY 150\n");
    let err = compile(ActionRegistry::builtin(), &[], Some(file.path())).unwrap_err();
    assert_eq!(
        err.kind(),
        Some(&DslErrorKind::Combo(ComboError::DelayOutOfRange(150.0)))
    );

    let file = kbd_file("COMBO_DELAY 12.5\n");
    let table = compile(ActionRegistry::builtin(), &[], Some(file.path())).unwrap();
    assert!((table.combos().window_secs() - 0.0125).abs() < 1e-12);
}

#[test]
fn test_map_out_of_range_fails() {
    let file = kbd_file("MAP 7\n");
    let err = compile(ActionRegistry::builtin(), &[], Some(file.path())).unwrap_err();
    assert_eq!(err.kind(), Some(&DslErrorKind::MapOutOfRange(7)));
}

#[test]
fn test_unknown_action_default_vs_file() {
    let defaults = vec![KeyBindingEntry::new("A", ["FOO", "", "", ""])];
    let table = compile(ActionRegistry::builtin(), &defaults, None).unwrap();
    assert!(table.get(key("A"), MapIndex::DEFAULT).is_none());

    let file = kbd_file("A FOO\n");
    let err = compile(ActionRegistry::builtin(), &defaults, Some(file.path())).unwrap_err();
    assert_eq!(err.kind(), Some(&DslErrorKind::UnknownAction("FOO".to_string())));
    assert!(err.to_string().contains(":1:"));
}

#[test]
fn test_combo_file_drives_router() {
    let file = kbd_file(
        "COMBO_DELAY 20\n\
         ADD_COMBO 0 LSHIFT RSHIFT\n\
         COMBO0 PD0L_KPE\n\
         LSHIFT PD0L_A_T\n",
    );
    let table = compile(ActionRegistry::builtin(), &[], Some(file.path())).unwrap();
    let mut router = InputRouter::new(&table);
    let t0 = Instant::now();

    // Both shifts together: the chord fires, the side button does not.
    router.key_down(key("LSHIFT"), t0);
    router.key_down(key("RSHIFT"), t0 + Duration::from_millis(5));
    assert_eq!(router.register(Target::Pad0L), 0x28);

    router.key_up(key("RSHIFT"), t0 + Duration::from_millis(100));
    router.key_up(key("LSHIFT"), t0 + Duration::from_millis(110));
    assert_eq!(router.register(Target::Pad0L), 0);

    // Alone, the left shift fires its own binding once the window passes.
    let t1 = t0 + Duration::from_secs(1);
    router.key_down(key("LSHIFT"), t1);
    assert_eq!(router.register(Target::Pad0L), 0);
    router.poll(t1 + Duration::from_millis(25));
    assert_eq!(router.register(Target::Pad0L), 0xA0 << 8);
}

#[test]
fn test_session_uses_settings_binding_file() {
    let file = kbd_file("MAP 2\nZ PD1L_KP0\n");
    let mut settings = Settings::new();
    settings.kbdhackfile = Some(file.path().to_path_buf());

    let session = Session::start(settings, &mut StockFactory::new()).unwrap();
    let binding = session.bindings().get(key("Z"), map(2)).unwrap();
    assert_eq!(binding.target, Target::Pad1L);
}

#[test]
fn test_unknown_key_line_is_skipped() {
    let file = kbd_file("A QUIT\nNO_SUCH_KEY QUIT\nB RESET\n");
    let table = compile(ActionRegistry::builtin(), &[], Some(file.path())).unwrap();

    assert_eq!(table.len(), 2);
    let b = table.get(key("B"), MapIndex::DEFAULT).unwrap();
    assert_eq!(b.or_mask, EMU_RESET);
}
