use cachet_datalog::{
    BinaryOp, Check, Expression, Fact, Policy, PolicyKind, Rule, Statement, SyntaxError, Term,
    UnaryOp, Value, parse_source,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use testresult::TestResult;

#[test]
fn it_parses_a_block_of_statements() -> TestResult {
    let source = r#"
        // authority facts
        right("file1", "read");
        right("file2", "write");

        can_read($f) <- right($f, "read"), $f.starts_with("file");
        check if operation("read") or operation("list");
        allow if user("admin");
        deny if true;
    "#;

    let statements = parse_source(source)?;
    let kinds = statements.iter().map(Statement::kind).collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec!["fact", "fact", "rule", "check", "policy", "policy"]
    );

    assert_eq!(
        statements[0],
        Statement::Fact(Fact::new("right", ["file1", "read"]))
    );
    Ok(())
}

#[test]
fn it_accepts_a_missing_final_semicolon_and_empty_sources() -> TestResult {
    assert_eq!(parse_source(r#"a(1); b(2)"#)?.len(), 2);
    assert!(parse_source("")?.is_empty());
    assert!(parse_source("  // nothing here\n")?.is_empty());
    Ok(())
}

#[test]
fn it_parses_every_value_kind_in_a_fact() -> TestResult {
    let fact: Fact =
        r#"values("text", -7, hex:00ff, true, 2024-01-01T00:00:00Z, ["a", "b"])"#.parse()?;

    assert_eq!(
        fact.values(),
        &[
            Value::from("text"),
            Value::from(-7i64),
            Value::from(vec![0x00u8, 0xff]),
            Value::from(true),
            Value::Date(1_704_067_200),
            Value::set(["a", "b"]),
        ]
    );
    Ok(())
}

#[test]
fn it_rejects_variables_in_facts() {
    let error = r#"user($name)"#.parse::<Fact>().unwrap_err();
    assert_eq!(
        error,
        SyntaxError::VariableInFact {
            fact: "user($name)".to_owned(),
            variable: "name".to_owned(),
        }
    );
}

#[test]
fn it_rejects_unbound_variables() {
    let unbound_head = r#"admin($u) <- user("root")"#.parse::<Rule>();
    assert!(matches!(
        unbound_head,
        Err(SyntaxError::UnboundVariable { variable, .. }) if variable == "u"
    ));

    let unbound_expression = r#"check if user($u), $n > 3"#.parse::<Check>();
    assert!(matches!(
        unbound_expression,
        Err(SyntaxError::UnboundVariable { variable, .. }) if variable == "n"
    ));
}

#[test]
fn it_rejects_malformed_text() {
    for source in [
        r#"user("admin""#,
        r#"user("admin") <-"#,
        r#"check user("admin")"#,
        r#"allow user("admin")"#,
        r#"user(hex:abc)"#,
        r#"1user("admin")"#,
    ] {
        assert!(
            matches!(parse_source(source), Err(SyntaxError::Parse { .. })),
            "{source} should not parse"
        );
    }
}

#[test]
fn it_builds_policies_of_both_kinds() -> TestResult {
    let allow: Policy = r#"allow if user("admin")"#.parse()?;
    assert_eq!(allow.kind(), PolicyKind::Allow);

    let deny: Policy = r#"deny if blocked(true) or $t.length() > 0, token($t)"#.parse()?;
    assert_eq!(deny.kind(), PolicyKind::Deny);
    assert_eq!(deny.queries().len(), 2);
    assert_eq!(
        deny.to_string(),
        r#"deny if blocked(true) or token($t), $t.length() > 0"#
    );
    Ok(())
}

#[test]
fn it_prints_statements_that_parse_back() -> TestResult {
    for source in [
        r#"right("file1", "read")"#,
        r#"can_read($f) <- right($f, "read"), $f.ends_with(".txt")"#,
        r#"check if time($t), $t < 2030-01-01T00:00:00Z"#,
        r#"check if ops($o), ["read", "write"].contains($o) || $o == "admin""#,
        r#"allow if size($s), ($s + 1) * 2 <= 100, !($s == 0)"#,
    ] {
        let statements = parse_source(source)?;
        assert_eq!(statements.len(), 1);
        let printed = statements[0].to_string();
        assert_eq!(parse_source(&printed)?, statements, "{printed}");
    }
    Ok(())
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Integer),
        any::<String>().prop_map(Value::String),
        proptest::collection::vec(any::<u8>(), 0..8).prop_map(Value::Bytes),
        any::<bool>().prop_map(Value::Bool),
        (0u64..=253_402_300_799).prop_map(Value::Date),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => scalar(),
        1 => proptest::collection::btree_set(scalar(), 0..4).prop_map(Value::Set),
    ]
}

fn expression() -> impl Strategy<Value = Expression> {
    let leaf = prop_oneof![
        value().prop_map(Expression::value),
        "[a-z][a-z0-9_]{0,4}".prop_map(Expression::var),
    ];
    leaf.prop_recursive(4, 32, 2, |inner| {
        let unary = prop_oneof![Just(UnaryOp::Negate), Just(UnaryOp::Length)];
        let binary = prop_oneof![
            Just(BinaryOp::Or),
            Just(BinaryOp::And),
            Just(BinaryOp::Equal),
            Just(BinaryOp::NotEqual),
            Just(BinaryOp::LessThan),
            Just(BinaryOp::GreaterThan),
            Just(BinaryOp::LessOrEqual),
            Just(BinaryOp::GreaterOrEqual),
            Just(BinaryOp::Add),
            Just(BinaryOp::Sub),
            Just(BinaryOp::Mul),
            Just(BinaryOp::Div),
            Just(BinaryOp::Contains),
            Just(BinaryOp::StartsWith),
            Just(BinaryOp::EndsWith),
            Just(BinaryOp::Intersection),
            Just(BinaryOp::Union),
        ];
        prop_oneof![
            (unary, inner.clone()).prop_map(|(op, operand)| Expression::unary(op, operand)),
            (binary, inner.clone(), inner)
                .prop_map(|(op, left, right)| Expression::binary(op, left, right)),
        ]
    })
}

proptest! {
    #[test]
    fn printed_facts_parse_back(values in proptest::collection::vec(value(), 0..5)) {
        let fact = Fact::new("sample", values);
        let parsed: Fact = fact.to_string().parse().unwrap();
        prop_assert_eq!(parsed, fact);
    }

    #[test]
    fn printed_expressions_parse_back(expression in expression()) {
        // Bind every variable through a body predicate so the check is valid.
        let variables = expression
            .variables()
            .into_iter()
            .map(|name| Term::var(name).to_string())
            .collect::<Vec<_>>();
        let source = if variables.is_empty() {
            format!("check if {expression}")
        } else {
            format!("check if vars({}), {expression}", variables.join(", "))
        };

        let check: Check = source.parse().unwrap();
        prop_assert_eq!(&check.queries()[0].expressions()[0], &expression);
        prop_assert_eq!(check.to_string(), source);
    }
}
