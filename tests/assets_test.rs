//! Asset discovery against a real directory tree

use std::fs;
use std::path::Path;
use vvspeak::assets::{AssetLocator, AssetNames};
use vvspeak::{AssetKind, VvspeakError};

/// Lay out a tree shaped like an unpacked VOICEVOX distribution
fn voicevox_tree(root: &Path, names: &AssetNames) {
    let lib = root.join("onnxruntime/lib");
    fs::create_dir_all(&lib).unwrap();
    fs::write(lib.join(&names.runtime_library), b"").unwrap();

    fs::create_dir_all(root.join("dict").join(&names.dictionary_dir)).unwrap();
    fs::write(
        root.join("dict").join(&names.dictionary_dir).join("sys.dic"),
        b"",
    )
    .unwrap();

    let vvms = root.join("models/vvms");
    fs::create_dir_all(&vvms).unwrap();
    fs::write(vvms.join("0.vvm"), b"").unwrap();
    fs::write(vvms.join("1.vvm"), b"").unwrap();

    let c_api = root.join("c_api/lib");
    fs::create_dir_all(&c_api).unwrap();
    fs::write(c_api.join(&names.core_library), b"").unwrap();
}

#[test]
fn test_resolves_distribution_layout() {
    let dir = tempfile::tempdir().unwrap();
    let names = AssetNames::default();
    voicevox_tree(dir.path(), &names);

    let assets = AssetLocator::new().resolve(dir.path(), &names).unwrap();
    assert_eq!(
        assets.runtime_library,
        dir.path().join("onnxruntime/lib").join(&names.runtime_library)
    );
    assert_eq!(
        assets.dictionary_dir,
        dir.path().join("dict").join(&names.dictionary_dir)
    );
    assert_eq!(assets.voice_model, dir.path().join("models/vvms/0.vvm"));
    assert!(assets.core_library.ends_with(&names.core_library));
}

#[test]
fn test_resolution_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let names = AssetNames::default();
    voicevox_tree(dir.path(), &names);
    let locator = AssetLocator::new();

    let first = locator.resolve(dir.path(), &names).unwrap();
    let second = locator.resolve(dir.path(), &names).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_empty_root_reports_first_missing_asset() {
    let dir = tempfile::tempdir().unwrap();
    match AssetLocator::new().resolve(dir.path(), &AssetNames::default()) {
        Err(VvspeakError::AssetNotFound { kind, root, .. }) => {
            assert_eq!(kind, AssetKind::RuntimeLibrary);
            assert_eq!(root, dir.path());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_dictionary_must_be_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    let names = AssetNames::default();
    fs::write(dir.path().join(&names.dictionary_dir), b"").unwrap();

    assert!(matches!(
        AssetLocator::new().find_by_dir_name(
            dir.path(),
            &names.dictionary_dir,
            AssetKind::Dictionary
        ),
        Err(VvspeakError::AssetNotFound {
            kind: AssetKind::Dictionary,
            ..
        })
    ));
}

#[test]
fn test_model_name_selects_file() {
    let dir = tempfile::tempdir().unwrap();
    let names = AssetNames {
        voice_model: "1.vvm".to_string(),
        ..AssetNames::default()
    };
    voicevox_tree(dir.path(), &names);

    let assets = AssetLocator::new().resolve(dir.path(), &names).unwrap();
    assert_eq!(assets.voice_model, dir.path().join("models/vvms/1.vvm"));
}

#[cfg(unix)]
#[test]
fn test_symlink_loop_terminates() {
    use std::os::unix::fs::symlink;

    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a/b");
    fs::create_dir_all(&nested).unwrap();
    symlink(dir.path(), nested.join("loop")).unwrap();

    assert!(matches!(
        AssetLocator::new().find_by_file_name(dir.path(), "0.vvm", AssetKind::VoiceModel),
        Err(VvspeakError::AssetNotFound { .. })
    ));
}

#[cfg(unix)]
#[test]
fn test_symlinked_model_file_is_found() {
    use std::os::unix::fs::symlink;

    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store");
    fs::create_dir_all(&store).unwrap();
    fs::write(store.join("real.vvm"), b"").unwrap();
    symlink(store.join("real.vvm"), dir.path().join("0.vvm")).unwrap();

    let found = AssetLocator::new()
        .find_by_file_name(dir.path(), "0.vvm", AssetKind::VoiceModel)
        .unwrap();
    assert_eq!(found, dir.path().join("0.vvm"));
}
