//! A `/bin/sh` stand-in for gpg that speaks the channel flags.
//!
//! The script is written once per test binary. Its behaviour is picked by
//! the operation name, so every test shares a single executable.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use gpg_engine::config::EngineConfig;
use gpg_engine::process::ChannelBackend;
use gpg_engine::Engine;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

const SCRIPT: &str = r#"#!/bin/sh
ALL="$*"
STATUS=/dev/null
COMMAND=/dev/null
MESSAGE=
OP=
while [ $# -gt 0 ]; do
    case "$1" in
        --status-fd) STATUS="/proc/self/fd/$2"; shift ;;
        --command-fd) COMMAND="/proc/self/fd/$2"; shift ;;
        --status-file) STATUS="$2"; shift ;;
        --command-file) COMMAND="$2"; shift ;;
        --trust-model|--pinentry-mode|--homedir) shift ;;
        --no-tty|--no-secmem-warning|--no-permission-warning) ;;
        --exit-on-status-write-error|--enable-special-filenames|--batch) ;;
        -\&*) MESSAGE="/proc/self/fd/${1#??}" ;;
        *)
            if [ -z "$OP" ]; then
                OP="$1"
            elif [ -f "$1" ]; then
                MESSAGE="$1"
            fi
            ;;
    esac
    shift
done
status() { printf '[GNUPG:] %s\n' "$*" >>"$STATUS"; }

case "$OP" in
    --echo)
        exec cat
        ;;
    --flood)
        head -c 300000 /dev/zero | tr '\0' a
        yes 'gpg: noise' | head -n 20000 >&2
        exec cat
        ;;
    --decrypt)
        status NEED_PASSPHRASE ABC123 DEF456 1 0
        read -r reply <"$COMMAND"
        if [ "$reply" = "correct-pw" ]; then
            status GOOD_PASSPHRASE
            printf 'reply=[%s]' "$reply"
            exit 0
        elif [ -z "$reply" ]; then
            status MISSING_PASSPHRASE
        else
            status BAD_PASSPHRASE ABC123
        fi
        printf 'reply=[%s]' "$reply"
        exit 2
        ;;
    --bad-passphrase)
        status BAD_PASSPHRASE ABC123
        status NODATA 1
        echo "gpg: no valid OpenPGP data found." >&2
        exit 2
        ;;
    --list-keys)
        echo "gpg: public key not found" >&2
        exit 2
        ;;
    --import)
        status IMPORT_OK 0 0123456789ABCDEF
        status IMPORT_RES 1 0 0 0 1 0 0 0 0 1 0 1 0 0 0
        exit 0
        ;;
    --sign)
        status NEED_PASSPHRASE ABC123 DEF456 1 0
        exit 2
        ;;
    --delete-key)
        status DELETE_PROBLEM 2
        exit 2
        ;;
    --verify)
        printf 'sig:'
        cat "$MESSAGE"
        printf ' data:'
        cat
        ;;
    --commands)
        { read -r first; read -r second; } <"$COMMAND"
        printf '%s|%s' "$first" "$second"
        ;;
    --argv)
        printf '%s' "$ALL"
        ;;
    --version)
        echo "gpg (GnuPG) 2.2.27"
        echo "libgcrypt 1.8.8"
        ;;
    --hang)
        exec sleep 30
        ;;
    --ignore-term)
        trap '' TERM
        while :; do sleep 0.05; done
        ;;
    *)
        echo "gpg: invalid option \"$OP\"" >&2
        exit 2
        ;;
esac
"#;

static DOUBLE: OnceLock<TempDir> = OnceLock::new();

/// Path of the shared test double.
pub fn double_path() -> PathBuf {
    let dir = DOUBLE.get_or_init(|| {
        let dir = TempDir::new().expect("create double dir");
        let path = dir.path().join("gpg");
        std::fs::write(&path, SCRIPT).expect("write double");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod double");
        dir
    });
    dir.path().join("gpg")
}

/// Install a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn config(backend: ChannelBackend) -> EngineConfig {
    EngineConfig {
        binary: double_path(),
        channel_backend: Some(backend),
        ..EngineConfig::default()
    }
}

/// An engine wired to the test double over extra pipes.
pub fn engine() -> Engine {
    engine_with(ChannelBackend::Pipes)
}

pub fn engine_with(backend: ChannelBackend) -> Engine {
    init_tracing();
    Engine::new(config(backend))
}

/// An engine for a binary that is not the double.
pub fn engine_for(binary: &Path) -> Engine {
    init_tracing();
    Engine::new(EngineConfig {
        binary: binary.to_path_buf(),
        ..EngineConfig::default()
    })
}
