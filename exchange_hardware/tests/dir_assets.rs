use exchange_hardware::DirAssets;
use exchange_traits::Assets;
use rstest::rstest;

fn tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    for f in [
        "system/busy_tone.wav",
        "persona_01/b.mp3",
        "persona_01/a.mp3",
        "persona_01/.hidden",
        "persona_01/sub/deep.mp3",
    ] {
        let p = root.join(f);
        std::fs::create_dir_all(p.parent().expect("parent")).expect("mkdir");
        std::fs::write(p, b"x").expect("write");
    }
    dir
}

#[rstest]
#[case("/system/busy_tone.wav", true)]
#[case("system/busy_tone.wav", true)]
#[case("/system/missing.wav", false)]
#[case("/system", false)]
fn exists_checks_files(#[case] path: &str, #[case] expected: bool) {
    let dir = tree();
    let assets = DirAssets::open(dir.path()).expect("open");
    assert_eq!(assets.exists(path), expected);
}

#[test]
fn list_returns_sorted_direct_files() {
    let dir = tree();
    let assets = DirAssets::open(dir.path()).expect("open");
    assert_eq!(
        assets.list("/persona_01"),
        vec!["/persona_01/a.mp3", "/persona_01/b.mp3"]
    );
    assert!(assets.list("/nope").is_empty());
}

#[test]
fn open_rejects_missing_root() {
    let dir = tree();
    assert!(DirAssets::open(dir.path().join("absent")).is_err());
    assert!(DirAssets::open(dir.path().join("system/busy_tone.wav")).is_err());
}
