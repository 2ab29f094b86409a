// Structural checks over compiled programs and compile failure reporting
use crate::regex::detail::{OpCode, ProgramImpl};
use crate::*;

const CORPUS: &[&str] = &[
    "a",
    "abc|def",
    "(a|b)*c",
    "^(\\d+)\\.(\\d+)$",
    "[^\\s,]+(,[^\\s,]+)*",
    "x{2,5}?y",
    "(?:(a)|(b))+",
    "\\Ahello\\b.*world\\Z",
    "[a-f0-9]{8}-[a-f0-9]{4}",
    "((((a))))",
    "\\x41\\u00e9\\012",
    "a{3,}|b?",
];

fn all_flags() -> [RegexFlags; 5] {
    [
        RegexFlags::DEFAULT,
        RegexFlags::IGNORECASE,
        RegexFlags::MULTILINE | RegexFlags::EXT_NEWLINE,
        RegexFlags::DOTALL | RegexFlags::ASCII,
        RegexFlags::all(),
    ]
}

fn check_well_formed(program: &ProgramImpl, pattern: &str) {
    let code = program.instructions();
    let len = code.len() as u32;
    assert!(!code.is_empty(), "{}", pattern);
    assert_eq!(program.start_pc(), 0);

    let mut open = vec![0usize; program.groups_count() + 1];
    let mut ends = 0;
    for (pc, inst) in code.iter().enumerate() {
        let op = inst.get_opcode();
        assert!(op.is_some(), "invalid word at {} in {}", pc, pattern);
        match op {
            Some(OpCode::Split) => {
                assert!(inst.get_a() < len && inst.get_b() < len, "{} at {} in {}", inst, pc, pattern);
            }
            Some(OpCode::Jmp) => assert!(inst.get_a() < len, "{} at {} in {}", inst, pc, pattern),
            Some(OpCode::Class | OpCode::NClass) => {
                assert!((inst.get_a() as usize) < program.classes().len(), "{}", pattern);
            }
            Some(OpCode::Lbra) => {
                let group = inst.get_a() as usize;
                assert!(group >= 1 && group <= program.groups_count(), "{}", pattern);
                open[group] += 1;
            }
            Some(OpCode::Rbra) => {
                let group = inst.get_a() as usize;
                assert!(group >= 1 && group <= program.groups_count(), "{}", pattern);
                assert!(open[group] > 0, "RBRA before LBRA in {}", pattern);
                open[group] -= 1;
            }
            Some(OpCode::End) => ends += 1,
            _ => {}
        }
    }
    assert_eq!(ends, 1, "{}", pattern);
    assert_eq!(code.last().and_then(|i| i.get_opcode()), Some(OpCode::End));
    assert!(open.iter().all(|&n| n == 0), "unbalanced groups in {}", pattern);
}

#[test]
fn test_corpus_compiles_well_formed() {
    for pattern in CORPUS {
        for flags in all_flags() {
            for capture in [CaptureGroups::Extract, CaptureGroups::NonCapture] {
                let program = RegexProgram::create(pattern, flags, capture).unwrap();
                check_well_formed(program.get_impl().unwrap(), pattern);
            }
        }
    }
}

#[test]
fn test_flags_do_not_change_group_count() {
    for pattern in CORPUS {
        let expected = RegexProgram::new(pattern).unwrap().groups_count();
        for flags in all_flags() {
            let program = RegexProgram::create(pattern, flags, CaptureGroups::Extract).unwrap();
            assert_eq!(program.groups_count(), expected, "{} with {}", pattern, flags);
        }
    }
}

#[test]
fn test_non_capture_emits_no_group_markers() {
    for pattern in CORPUS {
        let program = RegexProgram::create(pattern, RegexFlags::DEFAULT, CaptureGroups::NonCapture).unwrap();
        assert_eq!(program.groups_count(), 0);
        let compiled = program.get_impl().unwrap();
        assert!(
            compiled
                .instructions()
                .iter()
                .all(|i| !matches!(i.get_opcode(), Some(OpCode::Lbra | OpCode::Rbra))),
            "{}",
            pattern
        );
    }
}

#[test]
fn test_group_counts() {
    let cases = [
        ("abc", 0),
        ("(a)", 1),
        ("(?:a)", 0),
        ("((a)(b))", 3),
        ("(a)|(b)|(c)", 3),
        ("(?:(a)|(b))+", 2),
        ("\\(a\\)", 0),
        ("[(]a[)]", 0),
    ];
    for (pattern, groups) in cases {
        assert_eq!(RegexProgram::new(pattern).unwrap().groups_count(), groups, "{}", pattern);
    }
}

#[test]
fn test_compile_failure_reports_caller_and_pattern() {
    let line = line!() + 1;
    let err = RegexProgram::new("ab(cd").unwrap_err();
    let location = err.location();
    assert_eq!(location.file, file!());
    assert_eq!(location.line, line);

    let message = err.to_string();
    assert!(message.starts_with(&format!("devrx failure at: {}:{}: ", file!(), line)), "{}", message);
    assert!(message.contains("invalid regex pattern 'ab(cd'"), "{}", message);
    assert!(message.contains("missing ')'"), "{}", message);
}

#[test]
fn test_failure_kinds() {
    let kind = |pattern: &str| RegexProgram::new(pattern).unwrap_err().precondition_kind();
    assert_eq!(kind("a{1001}"), Some(PreconditionKind::OutOfRange));
    assert_eq!(kind("(a)\\1"), Some(PreconditionKind::Unsupported));
    assert_eq!(kind("a(?=b)"), Some(PreconditionKind::Unsupported));
    assert_eq!(kind("[z-a]"), Some(PreconditionKind::InvalidArgument));
    assert_eq!(kind("a\\"), Some(PreconditionKind::InvalidArgument));
    assert_eq!(kind(&"(".repeat(300)), Some(PreconditionKind::OutOfRange));
}

#[test]
fn test_instruction_limit_is_a_precondition_failure() {
    let pattern = format!("(?:{}){{1000}}", "a".repeat(40));
    let err = RegexProgram::new(&pattern).unwrap_err();
    assert!(err.is_precondition());
    assert_eq!(err.precondition_kind(), Some(PreconditionKind::OutOfRange));
    assert!(err.to_string().contains("instructions"));
}

#[test]
fn test_dotall_and_multiline_lowering() {
    let ops = |pattern: &str, flags: RegexFlags| -> Vec<Option<OpCode>> {
        let program = RegexProgram::create(pattern, flags, CaptureGroups::Extract).unwrap();
        program
            .get_impl()
            .unwrap()
            .instructions()
            .iter()
            .map(|i| i.get_opcode())
            .collect()
    };
    assert_eq!(ops("^.$", RegexFlags::DEFAULT), vec![
        Some(OpCode::TextStart),
        Some(OpCode::Any),
        Some(OpCode::TextEnd),
        Some(OpCode::End),
    ]);
    assert_eq!(ops("^.$", RegexFlags::MULTILINE | RegexFlags::DOTALL), vec![
        Some(OpCode::LineStart),
        Some(OpCode::AnyNl),
        Some(OpCode::LineEnd),
        Some(OpCode::End),
    ]);
}

#[test]
fn test_ignorecase_classes_match_both_cases() {
    let program = RegexProgram::create("[a-c]x", RegexFlags::IGNORECASE, CaptureGroups::Extract).unwrap();
    let compiled = program.get_impl().unwrap();
    let range = &compiled.classes()[0];
    for c in ['a', 'B', 'c', 'C'] {
        assert!(range.matches(c), "{}", c);
    }
    assert!(!range.matches('D'));
    let x = &compiled.classes()[1];
    assert!(x.matches('x') && x.matches('X'));
}

#[test]
fn test_zero_width_repeats_compile_promptly() {
    let start = std::time::Instant::now();
    for (pattern, capture) in [
        ("(?:(?:(?:(?:){1000}){1000}){1000}){1000}", CaptureGroups::Extract),
        ("(?:(?:(?:a{0}){1000}){1000}){1000}", CaptureGroups::Extract),
        ("(((){1000}){1000}){1000}", CaptureGroups::NonCapture),
        ("((?:(?:)*){1000}){1000}", CaptureGroups::NonCapture),
    ] {
        let program = RegexProgram::create(pattern, RegexFlags::DEFAULT, capture).unwrap();
        assert_eq!(program.instructions_count(), 1, "{}", pattern);
        let only = program.get_impl().unwrap().instructions()[0];
        assert_eq!(only.get_opcode(), Some(OpCode::End));
    }

    // capturing empty groups do emit markers, so the budget applies
    let err = RegexProgram::new("(((){1000}){1000}){1000}").unwrap_err();
    assert_eq!(err.precondition_kind(), Some(PreconditionKind::OutOfRange));

    assert!(start.elapsed() < std::time::Duration::from_secs(5), "took {:?}", start.elapsed());
}
