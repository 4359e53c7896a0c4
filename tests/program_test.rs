mod common;
use common::*;
use tinybc::ir::{Condition, Instruction, Label, Slot};

#[test]
fn test_precedence() {
    assert_eq!(exec("PRINT 2+3*4"), "14\n");
    assert_eq!(exec("PRINT (2+3)*4"), "20\n");
    assert_eq!(exec("PRINT 10-4-3"), "3\n");
    assert_eq!(exec("PRINT 64/4/2"), "8\n");
    assert_eq!(exec("PRINT 2*(3+4)*5-1"), "69\n");
}

#[test]
fn test_signs_and_division() {
    assert_eq!(exec("PRINT -7/2"), "-3\n");
    assert_eq!(exec("PRINT +5-10"), "-5\n");
    assert_eq!(exec("PRINT -(2-5)*3"), "9\n");
    assert_eq!(exec("PRINT 9223372036854775807"), "9223372036854775807\n");
    assert_eq!(exec("PRINT -9223372036854775808"), "-9223372036854775808\n");
}

#[test]
fn test_print_list() {
    assert_eq!(exec("PRINT 1, \"a\", 2"), "1a2\n");
    assert_eq!(exec("PRINT \"x\"\nPRINT \"y\""), "x\ny\n");
}

#[test]
fn test_let_print() {
    let source = "10 LET A=5\n20 PRINT A,\"END\"";
    assert_eq!(exec(source), "5END\n");

    let program = compile(source);
    assert_eq!(program.slots, 1);

    let prints: Vec<_> = program
        .code
        .iter()
        .filter(|instruction| {
            matches!(
                instruction,
                Instruction::PrintInt | Instruction::PrintStr(_) | Instruction::PrintNewline
            )
        })
        .collect();

    assert_eq!(prints.len(), 3);
    assert_eq!(prints.last(), Some(&&Instruction::PrintNewline));
}

#[test]
fn test_self_loop_compiles() {
    let program = compile("10 IF 1<2 THEN GOTO 10");

    let skips = program
        .code
        .iter()
        .filter(|instruction| matches!(instruction, Instruction::SkipUnless { .. }))
        .count();
    assert_eq!(skips, 1);

    let jumps: Vec<_> = program
        .code
        .iter()
        .filter_map(|instruction| match instruction {
            Instruction::Jump(label) => Some(label.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(jumps, vec![Label::Line("10".into())]);
}

#[test]
fn test_relops() {
    let source = "\
10 LET A = 3
20 LET B = 5
30 IF A = B THEN PRINT \"eq\"
40 IF A <> B THEN PRINT \"ne\"
50 IF A < B THEN PRINT \"lt\"
60 IF A <= B THEN PRINT \"le\"
70 IF A > B THEN PRINT \"gt\"
80 IF A >= B THEN PRINT \"ge\"
90 IF B > A THEN PRINT \"gt2\"
100 IF A >= A THEN PRINT \"ge2\"
110 IF A >< B THEN PRINT \"crazy\"
";

    assert_eq!(exec(source), "ne\nlt\nle\ngt2\nge2\ncrazy\n");
}

#[test]
fn test_swapped_comparison() {
    let program = compile("IF 1 > 2 THEN END");
    assert!(program.code.contains(&Instruction::SkipUnless {
        condition: Condition::Less,
        swapped: true,
        target: Label::Skip(1),
    }));
}

#[test]
fn test_goto_loop() {
    let source = "\
10 LET I = 1
20 LET S = 0
30 LET S = S + I
40 LET I = I + 1
50 IF I <= 10 THEN GOTO 30
60 PRINT S
";

    assert_eq!(exec(source), "55\n");
}

#[test]
fn test_gosub_nesting() {
    let source = "\
10 GOSUB 100
20 PRINT \"back\"
30 END
100 PRINT \"a\"
110 GOSUB 200
120 PRINT \"c\"
130 RETURN
200 PRINT \"b\"
210 RETURN
";

    assert_eq!(exec(source), "a\nb\nc\nback\n");
}

#[test]
fn test_gosub_recursion() {
    let source = "\
10 LET N = 3
20 GOSUB 100
30 PRINT \"done\"
40 END
100 PRINT N
110 LET N = N - 1
120 IF N > 0 THEN GOSUB 100
130 RETURN
";

    assert_eq!(exec(source), "3\n2\n1\ndone\n");
}

#[test]
fn test_unmatched_return() {
    assert_eq!(exec("10 RETURN\n20 PRINT 1\n30 RETURN\n40 PRINT 2"), "1\n2\n");
}

#[test]
fn test_end_inside_subroutine() {
    let source = "10 GOSUB 30\n20 PRINT \"unreachable\"\n30 PRINT \"sub\"\n40 END\n";
    assert_eq!(exec(source), "sub\n");
}

#[test]
fn test_input() {
    let source = "10 INPUT A, B\n20 LET A = A * B\n30 LET B = 0\n40 PRINT A";
    assert_eq!(exec_with_input(source, &[6, 7]), "42\n");

    let program = compile(source);
    assert!(program.code.contains(&Instruction::Input(Slot(1))));
}

#[test]
fn test_unimplemented_statements_are_skipped() {
    assert_eq!(exec("CLEAR\nPRINT 1\nLIST\nRUN\nPRINT 2"), "1\n2\n");
}

#[test]
fn test_runtime_division_by_zero_is_not_checked() {
    let program = compile("LET Z = 0\nPRINT 1 / Z");
    assert_eq!(
        Machine::new(&program, &[]).run(1000),
        Err(Fault::DivideByZero)
    );
}
