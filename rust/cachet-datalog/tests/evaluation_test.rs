use cachet_datalog::{
    Check, EvaluationError, Fact, FactSet, Rule, RunLimits, check_satisfied, evaluate,
};
use pretty_assertions::assert_eq;
use testresult::TestResult;

fn chain(length: i64) -> FactSet {
    FactSet::from_iter((0..length).map(|n| Fact::new("edge", [n, n + 1])))
}

fn transitive() -> Result<Vec<Rule>, cachet_datalog::SyntaxError> {
    Ok(vec![
        "path($a, $b) <- edge($a, $b)".parse()?,
        "path($a, $c) <- path($a, $b), edge($b, $c)".parse()?,
    ])
}

#[test_log::test]
fn it_computes_the_transitive_closure() -> TestResult {
    let closure = evaluate(chain(5), &transitive()?, &RunLimits::default())?;

    // 5 edges plus 5 + 4 + 3 + 2 + 1 paths
    assert_eq!(closure.len(), 5 + 15);
    assert!(closure.contains(&Fact::new("path", [0i64, 5])));
    assert!(!closure.contains(&Fact::new("path", [5i64, 0])));
    Ok(())
}

#[test_log::test]
fn rule_order_does_not_change_the_closure() -> TestResult {
    let rules = transitive()?;
    let reversed = rules.iter().rev().cloned().collect::<Vec<_>>();

    let forward = evaluate(chain(6), &rules, &RunLimits::default())?;
    let backward = evaluate(chain(6), &reversed, &RunLimits::default())?;
    assert_eq!(forward, backward);
    Ok(())
}

#[test_log::test]
fn it_stops_when_the_iteration_cap_is_reached() -> TestResult {
    let limits = RunLimits {
        max_iterations: Some(2),
        ..RunLimits::default()
    };
    let result = evaluate(chain(10), &transitive()?, &limits);
    assert_eq!(result, Err(EvaluationError::IterationLimit { limit: 2 }));
    Ok(())
}

#[test_log::test]
fn it_stops_a_combinatorial_explosion() -> TestResult {
    let facts = FactSet::from_iter((0..200i64).map(|n| Fact::new("n", [n])));
    let rules: Vec<Rule> = vec!["pair($a, $b) <- n($a), n($b)".parse()?];

    let result = evaluate(facts, &rules, &RunLimits::default());
    assert_eq!(result, Err(EvaluationError::FactLimit { limit: 10_000 }));
    Ok(())
}

#[test_log::test]
fn checks_see_derived_facts_and_expressions() -> TestResult {
    let facts = FactSet::from_iter([
        Fact::new("resource", ["/pub/readme.md"]),
        Fact::new("owner", ["/pub/readme.md", "alice"]),
    ]);
    let rules: Vec<Rule> =
        vec![r#"public($r) <- resource($r), $r.starts_with("/pub/")"#.parse()?];
    let closure = evaluate(facts, &rules, &RunLimits::default())?;

    let owned: Check = r#"check if public($r), owner($r, $who), $who == "alice""#.parse()?;
    assert!(check_satisfied(&owned, &closure, &RunLimits::default())?);

    let private: Check = r#"check if public($r), $r.ends_with(".key")"#.parse()?;
    assert!(!check_satisfied(&private, &closure, &RunLimits::default())?);
    Ok(())
}

#[test]
fn limits_load_from_partial_configuration() -> TestResult {
    let limits: RunLimits = serde_json::from_str(r#"{ "max_iterations": 64 }"#)?;
    assert_eq!(
        limits,
        RunLimits {
            max_facts: 10_000,
            max_iterations: Some(64),
            max_bindings: 100_000,
        }
    );
    Ok(())
}

#[test_log::test]
fn wide_checks_are_bounded() -> TestResult {
    let closure = FactSet::from_iter((0..14i64).map(|n| Fact::new("n", [n])));
    let limits = RunLimits::default();

    let selective: Check =
        "check if n($a), n($b), n($c), n($d), n($e), n($f), $a == -1".parse()?;
    assert!(!check_satisfied(&selective, &closure, &limits)?);

    let exhaustive: Check =
        "check if n($a), n($b), n($c), n($d), n($e), n($f), $a != -1".parse()?;
    assert_eq!(
        check_satisfied(&exhaustive, &closure, &limits),
        Err(EvaluationError::BindingLimit {
            limit: limits.max_bindings
        })
    );
    Ok(())
}
