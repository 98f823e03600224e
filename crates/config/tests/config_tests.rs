// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use sequent_config::{IrqStimulus, SystemManifest, TestAssertion, TestScript};

#[test]
fn test_full_manifest_parses() {
    let yaml = r#"
schema_version: "1.0"
name: "bench-board"
memory:
  base: 0x0
  size: "64KiB"
boot_address: 0xE000
vector_base: 0xFFF0
load_address: 0xE000
irq_stimuli:
  - line: 0
    assert_at: 100
    release_at: 140
  - line: 3
    assert_at: 100
"#;
    let manifest = SystemManifest::from_yaml(yaml).unwrap();
    assert_eq!(manifest.name, "bench-board");
    assert_eq!(manifest.boot_address, 0xE000);
    assert_eq!(manifest.vector_base, 0xFFF0);
    assert_eq!(manifest.memory_size().unwrap(), 65536);
    assert_eq!(
        manifest.irq_stimuli[0],
        IrqStimulus {
            line: 0,
            assert_at: 100,
            release_at: Some(140)
        }
    );
    assert_eq!(manifest.irq_stimuli[1].release_at, None);
}

#[test]
fn test_small_memory_window() {
    let yaml = r#"
name: "half"
memory:
  base: 0x8000
  size: "32KiB"
"#;
    let manifest = SystemManifest::from_yaml(yaml).unwrap();
    assert_eq!(manifest.memory.base, 0x8000);
    assert_eq!(manifest.memory_size().unwrap(), 0x8000);
}

#[test]
fn test_unaligned_boot_address_rejected() {
    let err = SystemManifest::from_yaml("name: odd\nboot_address: 0xF001\n").unwrap_err();
    assert!(err.to_string().contains("aligned"));
}

#[test]
fn test_script_rejects_unknown_fields() {
    let yaml = r#"
schema_version: "1.0"
inputs:
  image: "prog.bin"
limits:
  max_cycles: 100
  max_steps: 100
"#;
    assert!(serde_yaml::from_str::<TestScript>(yaml).is_err());
}

#[test]
fn test_memory_assertion_with_mask() {
    let yaml = r#"
schema_version: "1.0"
inputs:
  image: "prog.bin"
limits:
  max_cycles: 100
assertions:
  - memory_value:
      address: 0x03FE
      expected_value: 0x0008
      mask: 0x00FF
"#;
    let script: TestScript = serde_yaml::from_str(yaml).unwrap();
    script.validate().unwrap();
    match &script.assertions[0] {
        TestAssertion::MemoryValue(a) => {
            assert_eq!(a.memory_value.address, 0x03FE);
            assert_eq!(a.memory_value.mask, Some(0x00FF));
        }
        other => panic!("unexpected assertion {:?}", other),
    }
}

#[test]
fn test_memory_window_past_address_space_rejected() {
    let yaml = "name: x\nmemory:\n  base: 18446744073709551615\n  size: \"64KiB\"\n";
    let err = SystemManifest::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("address space"));

    let yaml = "name: x\nmemory:\n  base: 0x8000\n  size: \"64KiB\"\n";
    assert!(SystemManifest::from_yaml(yaml).is_err());
}

#[test]
fn test_load_address_outside_address_space_rejected() {
    let err = SystemManifest::from_yaml("name: x\nload_address: 0x10000\n").unwrap_err();
    assert!(err.to_string().contains("load_address"));
}
