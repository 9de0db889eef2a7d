//! Parser for the textual statement syntax.
//!
//! ```text
//! right("file1", "read");
//! can_read($f) <- right($f, "read"), $f.starts_with("/pub");
//! check if operation("read") or operation("list");
//! allow if user("admin");
//! ```

use chrono::DateTime;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace1, not_line_ending, satisfy},
    combinator::{all_consuming, map, map_opt, map_res, not, opt, peek, recognize, value},
    error::{Error, ErrorKind},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
};

use crate::{
    BinaryOp, Check, Expression, Fact, Policy, PolicyKind, Predicate, Query, Rule, Statement,
    SyntaxError, Term, UnaryOp, Value,
};

type ParseResult<'a, O> = IResult<&'a str, O>;

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Whitespace and `//` comments.
fn space(input: &str) -> ParseResult<'_, ()> {
    value(
        (),
        many0(alt((
            multispace1,
            recognize(pair(tag("//"), not_line_ending)),
        ))),
    )(input)
}

fn token<'a>(symbol: &'static str) -> impl FnMut(&'a str) -> ParseResult<'a, &'a str> {
    preceded(space, tag(symbol))
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> ParseResult<'a, &'a str> {
    preceded(space, terminated(tag(word), not(peek(satisfy(is_name_char)))))
}

fn name(input: &str) -> ParseResult<'_, &str> {
    preceded(
        space,
        recognize(pair(
            satisfy(|c| c.is_ascii_alphabetic()),
            take_while(is_name_char),
        )),
    )(input)
}

fn variable(input: &str) -> ParseResult<'_, Term> {
    map(preceded(char('$'), take_while1(is_name_char)), Term::var)(input)
}

fn string(input: &str) -> ParseResult<'_, String> {
    let (mut rest, _) = char('"')(input)?;
    let mut text = String::new();
    loop {
        let mut chars = rest.chars();
        match chars.next() {
            None => return Err(nom::Err::Error(Error::new(rest, ErrorKind::Char))),
            Some('"') => return Ok((chars.as_str(), text)),
            Some('\\') => {
                let escaped = match chars.next() {
                    Some('"') => '"',
                    Some('\\') => '\\',
                    Some('n') => '\n',
                    Some('t') => '\t',
                    _ => return Err(nom::Err::Error(Error::new(rest, ErrorKind::Escaped))),
                };
                text.push(escaped);
            }
            Some(other) => text.push(other),
        }
        rest = chars.as_str();
    }
}

fn decode_hex(digits: &str) -> Option<Vec<u8>> {
    if digits.len() % 2 != 0 {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|index| u8::from_str_radix(&digits[index..index + 2], 16).ok())
        .collect()
}

fn bytes(input: &str) -> ParseResult<'_, Vec<u8>> {
    preceded(
        tag("hex:"),
        map_opt(take_while(|c: char| c.is_ascii_hexdigit()), decode_hex),
    )(input)
}

fn date(input: &str) -> ParseResult<'_, u64> {
    let offset = alt((
        tag("Z"),
        recognize(tuple((
            alt((char('+'), char('-'))),
            digit1,
            char(':'),
            digit1,
        ))),
    ));
    let timestamp = recognize(tuple((
        digit1,
        char('-'),
        digit1,
        char('-'),
        digit1,
        char('T'),
        take_while1(|c: char| c.is_ascii_digit() || c == ':' || c == '.'),
        offset,
    )));
    map_opt(timestamp, |text: &str| {
        DateTime::parse_from_rfc3339(text)
            .ok()
            .and_then(|instant| u64::try_from(instant.timestamp()).ok())
    })(input)
}

fn integer(input: &str) -> ParseResult<'_, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), str::parse::<i64>)(input)
}

fn boolean(input: &str) -> ParseResult<'_, bool> {
    terminated(
        alt((value(true, tag("true")), value(false, tag("false")))),
        not(peek(satisfy(is_name_char))),
    )(input)
}

fn scalar(input: &str) -> ParseResult<'_, Value> {
    alt((
        map(string, Value::String),
        map(bytes, Value::Bytes),
        map(date, Value::Date),
        map(integer, Value::Integer),
        map(boolean, Value::Bool),
    ))(input)
}

fn set(input: &str) -> ParseResult<'_, Value> {
    map(
        delimited(
            char('['),
            separated_list0(token(","), preceded(space, scalar)),
            token("]"),
        ),
        Value::set,
    )(input)
}

fn term(input: &str) -> ParseResult<'_, Term> {
    preceded(
        space,
        alt((variable, map(alt((scalar, set)), Term::Value))),
    )(input)
}

fn predicate(input: &str) -> ParseResult<'_, Predicate> {
    map(
        pair(
            name,
            delimited(
                token("("),
                separated_list0(token(","), term),
                token(")"),
            ),
        ),
        |(name, terms)| Predicate::new(name, terms),
    )(input)
}

const OR: &[(&str, BinaryOp)] = &[("||", BinaryOp::Or)];
const AND: &[(&str, BinaryOp)] = &[("&&", BinaryOp::And)];
const COMPARISON: &[(&str, BinaryOp)] = &[
    ("==", BinaryOp::Equal),
    ("!=", BinaryOp::NotEqual),
    ("<=", BinaryOp::LessOrEqual),
    (">=", BinaryOp::GreaterOrEqual),
    ("<", BinaryOp::LessThan),
    (">", BinaryOp::GreaterThan),
];
const ADDITIVE: &[(&str, BinaryOp)] = &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)];
const MULTIPLICATIVE: &[(&str, BinaryOp)] = &[("*", BinaryOp::Mul), ("/", BinaryOp::Div)];

fn operator<'a>(input: &'a str, operators: &[(&str, BinaryOp)]) -> Option<(&'a str, BinaryOp)> {
    let (input, _) = space(input).ok()?;
    operators
        .iter()
        .find_map(|&(symbol, op)| input.strip_prefix(symbol).map(|rest| (rest, op)))
}

fn left_assoc<'a>(
    input: &'a str,
    operand: fn(&'a str) -> ParseResult<'a, Expression>,
    operators: &[(&str, BinaryOp)],
) -> ParseResult<'a, Expression> {
    let (mut input, mut left) = operand(input)?;
    while let Some((rest, op)) = operator(input, operators) {
        match operand(rest) {
            Ok((rest, right)) => {
                left = Expression::binary(op, left, right);
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(error) => return Err(error),
        }
    }
    Ok((input, left))
}

fn expression(input: &str) -> ParseResult<'_, Expression> {
    left_assoc(input, and_expression, OR)
}

fn and_expression(input: &str) -> ParseResult<'_, Expression> {
    left_assoc(input, comparison, AND)
}

fn comparison(input: &str) -> ParseResult<'_, Expression> {
    left_assoc(input, additive, COMPARISON)
}

fn additive(input: &str) -> ParseResult<'_, Expression> {
    left_assoc(input, multiplicative, ADDITIVE)
}

fn multiplicative(input: &str) -> ParseResult<'_, Expression> {
    left_assoc(input, unary, MULTIPLICATIVE)
}

fn unary(input: &str) -> ParseResult<'_, Expression> {
    alt((
        map(preceded(token("!"), unary), |operand| {
            Expression::unary(UnaryOp::Negate, operand)
        }),
        method_call,
    ))(input)
}

fn method(name: &str) -> Option<BinaryOp> {
    match name {
        "contains" => Some(BinaryOp::Contains),
        "starts_with" => Some(BinaryOp::StartsWith),
        "ends_with" => Some(BinaryOp::EndsWith),
        "intersection" => Some(BinaryOp::Intersection),
        "union" => Some(BinaryOp::Union),
        _ => None,
    }
}

fn method_call(input: &str) -> ParseResult<'_, Expression> {
    let (mut input, mut receiver) = primary(input)?;
    loop {
        let call = tuple((
            token("."),
            name,
            delimited(token("("), opt(expression), token(")")),
        ))(input);
        let (rest, (_, called, argument)) = match call {
            Ok(parsed) => parsed,
            Err(nom::Err::Error(_)) => return Ok((input, receiver)),
            Err(error) => return Err(error),
        };
        receiver = match (called, argument) {
            ("length", None) => Expression::unary(UnaryOp::Length, receiver),
            (called, Some(argument)) => match method(called) {
                Some(op) => Expression::binary(op, receiver, argument),
                None => return Ok((input, receiver)),
            },
            _ => return Ok((input, receiver)),
        };
        input = rest;
    }
}

fn primary(input: &str) -> ParseResult<'_, Expression> {
    alt((
        delimited(token("("), expression, token(")")),
        map(term, Expression::Term),
    ))(input)
}

enum Element {
    Predicate(Predicate),
    Expression(Expression),
}

fn query(input: &str) -> ParseResult<'_, Query> {
    let element = alt((
        map(predicate, Element::Predicate),
        map(expression, Element::Expression),
    ));
    map(separated_list1(token(","), element), |elements| {
        let mut predicates = Vec::new();
        let mut expressions = Vec::new();
        for element in elements {
            match element {
                Element::Predicate(predicate) => predicates.push(predicate),
                Element::Expression(expression) => expressions.push(expression),
            }
        }
        Query::unchecked(predicates, expressions)
    })(input)
}

fn queries(input: &str) -> ParseResult<'_, Vec<Query>> {
    separated_list1(keyword("or"), query)(input)
}

/// A statement whose fact, if any, may still contain variables.
enum Parsed {
    Fact(Predicate),
    Rule(Rule),
    Check(Check),
    Policy(Policy),
}

impl Parsed {
    fn into_statement(self) -> Result<Statement, SyntaxError> {
        let statement = match self {
            Parsed::Fact(predicate) => Statement::Fact(Fact::try_from(predicate)?),
            Parsed::Rule(rule) => Statement::Rule(rule),
            Parsed::Check(check) => Statement::Check(check),
            Parsed::Policy(policy) => Statement::Policy(policy),
        };
        statement.validate()?;
        Ok(statement)
    }
}

fn statement(input: &str) -> ParseResult<'_, Parsed> {
    let check = map(preceded(pair(keyword("check"), keyword("if")), queries), |queries| {
        Parsed::Check(Check::unchecked(queries))
    });
    let policy = map(
        pair(
            terminated(
                alt((
                    value(PolicyKind::Allow, keyword("allow")),
                    value(PolicyKind::Deny, keyword("deny")),
                )),
                keyword("if"),
            ),
            queries,
        ),
        |(kind, queries)| Parsed::Policy(Policy::unchecked(kind, queries)),
    );
    let rule = map(
        tuple((predicate, token("<-"), query)),
        |(head, _, body)| Parsed::Rule(Rule::unchecked(head, body)),
    );
    let fact = map(predicate, Parsed::Fact);

    alt((check, policy, rule, fact))(input)
}

fn complete<'a, O>(
    source: &'a str,
    parser: impl FnMut(&'a str) -> ParseResult<'a, O>,
) -> Result<O, SyntaxError> {
    all_consuming(terminated(parser, space))(source)
        .map(|(_, output)| output)
        .map_err(|error| match error {
            nom::Err::Error(error) | nom::Err::Failure(error) => {
                SyntaxError::at(source, error.input)
            }
            nom::Err::Incomplete(_) => SyntaxError::at(source, ""),
        })
}

fn parse_statement(source: &str) -> Result<Statement, SyntaxError> {
    complete(source, terminated(statement, opt(token(";"))))?.into_statement()
}

fn unexpected(expected: &'static str, found: Statement) -> SyntaxError {
    SyntaxError::UnexpectedStatement {
        expected,
        found: found.to_string(),
    }
}

/// Parses a `;`-separated list of statements.
pub fn parse_source(source: &str) -> Result<Vec<Statement>, SyntaxError> {
    let statements = terminated(separated_list0(token(";"), statement), opt(token(";")));
    complete(source, statements)?
        .into_iter()
        .map(Parsed::into_statement)
        .collect()
}

/// Parses a single fact.
pub fn parse_fact(source: &str) -> Result<Fact, SyntaxError> {
    match parse_statement(source)? {
        Statement::Fact(fact) => Ok(fact),
        other => Err(unexpected("fact", other)),
    }
}

/// Parses a single rule.
pub fn parse_rule(source: &str) -> Result<Rule, SyntaxError> {
    match parse_statement(source)? {
        Statement::Rule(rule) => Ok(rule),
        other => Err(unexpected("rule", other)),
    }
}

/// Parses a single check.
pub fn parse_check(source: &str) -> Result<Check, SyntaxError> {
    match parse_statement(source)? {
        Statement::Check(check) => Ok(check),
        other => Err(unexpected("check", other)),
    }
}

/// Parses a single policy.
pub fn parse_policy(source: &str) -> Result<Policy, SyntaxError> {
    match parse_statement(source)? {
        Statement::Policy(policy) => Ok(policy),
        other => Err(unexpected("policy", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_parses_escaped_strings() {
        assert_eq!(
            string(r#""a \"quoted\" \\ word""#),
            Ok(("", r#"a "quoted" \ word"#.to_owned()))
        );
        assert_eq!(string(r#""""#), Ok(("", String::new())));
        assert!(string(r#""unterminated"#).is_err());
    }

    #[test]
    fn it_parses_every_scalar_kind() {
        assert_eq!(scalar("-12"), Ok(("", Value::Integer(-12))));
        assert_eq!(scalar("hex:0AFF"), Ok(("", Value::Bytes(vec![0x0a, 0xff]))));
        assert_eq!(scalar("true"), Ok(("", Value::Bool(true))));
        assert_eq!(
            scalar("1970-01-01T00:01:00Z"),
            Ok(("", Value::Date(60)))
        );
        assert!(scalar("hex:abc").is_err());
    }

    #[test]
    fn it_respects_operator_precedence() {
        let (rest, parsed) = expression("1 + 2 * 3 == 7 && !false").unwrap();
        assert_eq!(rest, "");
        assert_eq!(parsed.to_string(), "1 + 2 * 3 == 7 && !false");

        let expected = Expression::binary(
            BinaryOp::Add,
            Expression::value(1i64),
            Expression::binary(BinaryOp::Mul, Expression::value(2i64), Expression::value(3i64)),
        );
        assert_eq!(additive("1 + 2 * 3"), Ok(("", expected)));
    }

    #[test]
    fn it_chains_method_calls() {
        let (_, parsed) = expression(r#"$s.union(["a"]).contains("a")"#).unwrap();
        assert_eq!(parsed.to_string(), r#"$s.union(["a"]).contains("a")"#);
    }

    #[test]
    fn it_reports_the_offset_of_garbage() {
        let error = parse_fact(r#"user("admin") trailing"#).unwrap_err();
        assert_eq!(
            error,
            SyntaxError::Parse {
                input: r#"user("admin") trailing"#.to_owned(),
                offset: 14,
            }
        );
    }

    #[test]
    fn it_names_the_statement_it_found() {
        let error = parse_fact("check if true").unwrap_err();
        assert!(matches!(
            error,
            SyntaxError::UnexpectedStatement { expected: "fact", .. }
        ));
    }
}
