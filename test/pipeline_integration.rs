//! End-to-end pipeline tests: contracts on disk in, artifacts out.

use msgc::compile::{write_artifacts, Compiler};
use msgc::policy::Policy;
use msgc::Artifact;
use std::fs;
use std::path::PathBuf;

const ALPHA: &str = "\
[WantsConnection]
messages -> Alpha {
    Ping(int32_t value)
    Add(int32_t a, int32_t b) -> (int32_t sum) [Synchronous]
}
";

const BETA: &str = "\
messages -> Beta {
    Log(String text)
}
";

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("msgc-{}-{}", name, std::process::id()));
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_contract(dir: &PathBuf, receiver: &str, source: &str) {
    fs::write(dir.join(format!("{receiver}.messages.in")), source).unwrap();
}

fn artifact<'a>(artifacts: &'a [Artifact], name: &str) -> &'a str {
    &artifacts
        .iter()
        .find(|a| a.file_name == name)
        .unwrap_or_else(|| panic!("missing artifact {name}"))
        .contents
}

fn compiler() -> Compiler {
    Compiler::new(Policy::builtin().clone())
}

#[test]
fn compiles_receiver_set_from_disk() {
    let dir = scratch_dir("from-disk");
    write_contract(&dir, "Alpha", ALPHA);
    write_contract(&dir, "Beta", BETA);

    let artifacts = compiler()
        .compile_files(&dir, &["Beta".to_string(), "Alpha".to_string()])
        .unwrap();

    let registry = artifact(&artifacts, "MessageNames.h");
    assert!(registry.contains("Alpha_Ping = 0,"));
    assert!(registry.contains("Alpha_Add = 1,"));
    assert!(registry.contains("Beta_Log = 2,"));
    assert!(registry.contains("constexpr uint16_t messageNameCount = 3;"));

    let dispatcher = artifact(&artifacts, "AlphaMessageReceiver.cpp");
    assert!(dispatcher.contains("void Alpha::didReceiveAlphaMessage(IPC::Connection& connection, IPC::Decoder& decoder)"));
    assert!(dispatcher.contains("bool Alpha::didReceiveSyncAlphaMessage"));
    assert!(dispatcher.contains("case IPC::MessageName::Alpha_Add:"));
    assert!(dispatcher.contains("replyEncoder << sum;"));

    let declarations = artifact(&artifacts, "AlphaMessages.h");
    assert!(declarations.contains("using Arguments = std::tuple<int32_t, int32_t>;"));
    assert!(declarations.contains("using ReplyArguments = std::tuple<int32_t>;"));
}

#[test]
fn ordinals_independent_of_argument_order() {
    let dir = scratch_dir("arg-order");
    write_contract(&dir, "Alpha", ALPHA);
    write_contract(&dir, "Beta", BETA);

    let forward = compiler()
        .compile_files(&dir, &["Alpha".to_string(), "Beta".to_string()])
        .unwrap();
    let reversed = compiler()
        .compile_files(&dir, &["Beta".to_string(), "Alpha".to_string()])
        .unwrap();

    assert_eq!(forward.len(), reversed.len());
    for (a, b) in forward.iter().zip(reversed.iter()) {
        assert_eq!(a.file_name, b.file_name);
        assert_eq!(a.contents, b.contents, "artifact {} differs", a.file_name);
    }
}

#[test]
fn builtin_receiver_registered_but_not_dispatched() {
    let dir = scratch_dir("builtin");
    write_contract(&dir, "Alpha", ALPHA);
    write_contract(
        &dir,
        "Core",
        "[Builtin]\nmessages -> Core {\n    Boot(uint64_t stamp)\n}\n",
    );

    let artifacts = compiler()
        .compile_files(&dir, &["Alpha".to_string(), "Core".to_string()])
        .unwrap();

    let registry = artifact(&artifacts, "MessageNames.h");
    assert!(registry.contains("Core_Boot"));

    assert!(!artifacts.iter().any(|a| a.file_name == "CoreMessageReceiver.cpp"));
    assert!(!artifacts.iter().any(|a| a.file_name == "CoreMessages.h"));
    assert!(!artifact(&artifacts, "module.private.modulemap").contains("Core"));
}

#[test]
fn filename_must_match_declared_receiver() {
    let dir = scratch_dir("stem-mismatch");
    write_contract(&dir, "Renamed", BETA);

    let errors = compiler()
        .compile_files(&dir, &["Renamed".to_string()])
        .unwrap_err();
    let rendered = errors[0].to_string();
    assert!(rendered.contains("Beta"));
    assert!(rendered.contains("Renamed"));
}

#[test]
fn missing_contract_reported_per_input() {
    let dir = scratch_dir("missing");
    write_contract(&dir, "Beta", BETA);

    let errors = compiler()
        .compile_files(&dir, &["Beta".to_string(), "Ghost".to_string()])
        .unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("Ghost.messages.in"));
}

#[test]
fn opaque_policy_enforced_across_the_pipeline() {
    let dir = scratch_dir("opaque");
    write_contract(
        &dir,
        "Transfer",
        "messages -> Transfer {\n    Adopt(MachSendRight right)\n}\n",
    );

    // Builtin policy lists MachSendRight, so the bare use is rejected.
    let errors = compiler()
        .compile_files(&dir, &["Transfer".to_string()])
        .unwrap_err();
    assert!(errors[0].to_string().contains("MachSendRight"));

    // Marked use passes under the same policy.
    write_contract(
        &dir,
        "Transfer",
        "messages -> Transfer {\n    Adopt([Opaque] MachSendRight right)\n}\n",
    );
    compiler()
        .compile_files(&dir, &["Transfer".to_string()])
        .unwrap();

    // A replacement policy without the type rejects the marker instead.
    let strict = Compiler::new(Policy::with_opaque_types(["Handle"]));
    let errors = strict
        .compile_files(&dir, &["Transfer".to_string()])
        .unwrap_err();
    assert!(errors[0].to_string().contains("MachSendRight"));
}

#[test]
fn artifacts_written_and_overwritten() {
    let dir = scratch_dir("write");
    write_contract(&dir, "Beta", BETA);
    let output = dir.join("generated");

    let artifacts = compiler()
        .compile_files(&dir, &["Beta".to_string()])
        .unwrap();
    write_artifacts(&artifacts, &output).unwrap();

    let registry = fs::read_to_string(output.join("MessageNames.h")).unwrap();
    assert_eq!(registry, artifact(&artifacts, "MessageNames.h"));

    // A stale longer file is fully replaced, not partially overwritten.
    fs::write(
        output.join("MessageNames.h"),
        "stale ".repeat(4096),
    )
    .unwrap();
    write_artifacts(&artifacts, &output).unwrap();
    let rewritten = fs::read_to_string(output.join("MessageNames.h")).unwrap();
    assert_eq!(rewritten, artifact(&artifacts, "MessageNames.h"));
}

#[test]
fn policy_file_layered_over_builtin_list() {
    let dir = scratch_dir("policy-file");
    fs::write(
        dir.join("msgc.toml"),
        "[opaque]\ntypes = [\"GPU::TextureHandle\"]\n",
    )
    .unwrap();
    write_contract(
        &dir,
        "Render",
        "messages -> Render {\n    Bind([Opaque] GPU::TextureHandle texture, [Opaque] MachSendRight right)\n}\n",
    );

    let policy = Policy::load(&dir.join("msgc.toml")).unwrap();
    Compiler::new(policy)
        .compile_files(&dir, &["Render".to_string()])
        .unwrap();
}
