//! Blocks: the signed units a token is made of.

use std::fmt;

use cachet_credentials::{PublicKey, Signature};
use cachet_datalog::{Check, Fact, Rule, Statement, SyntaxError};
use serde::{Deserialize, Serialize};

use crate::{Error, RevocationId};

/// The logic statements carried by a block, plus an optional context label.
///
/// The context is never evaluated. It travels with the block for
/// diagnostics, e.g. to record the intended scope of an attenuation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContents {
    facts: Vec<Fact>,
    rules: Vec<Rule>,
    checks: Vec<Check>,
    context: Option<String>,
}

impl BlockContents {
    #[must_use]
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Re-validate decoded statements.
    ///
    /// # Errors
    ///
    /// Returns the first [`SyntaxError`] found in a rule or check, e.g. a
    /// head variable that the body never binds.
    pub fn validate(&self) -> Result<(), SyntaxError> {
        self.rules.iter().try_for_each(Rule::validate)?;
        self.checks.iter().try_for_each(Check::validate)
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>, Error> {
        serde_ipld_dagcbor::to_vec(self).map_err(|error| Error::Encoding(error.to_string()))
    }

    pub(crate) fn decode(data: &[u8]) -> Result<Self, Error> {
        let contents: Self = serde_ipld_dagcbor::from_slice(data).map_err(Error::malformed)?;
        contents
            .validate()
            .map_err(|error| Error::Malformed(format!("invalid statement: {error}")))?;
        if contents.encode()? != data {
            return Err(Error::Malformed("non-canonical block encoding".into()));
        }
        Ok(contents)
    }
}

/// Accumulates the statements of a new block.
///
/// ```rust
/// use cachet_token::BlockBuilder;
///
/// let block = BlockBuilder::new()
///     .code(r#"check if operation("read"); check if time($t), $t < 2030-01-01T00:00:00Z"#)
///     .unwrap()
///     .context("read-only until 2030")
///     .build();
/// assert_eq!(block.checks().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BlockBuilder {
    contents: BlockContents,
}

impl BlockBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fact. Duplicates are ignored.
    #[must_use]
    pub fn fact(mut self, fact: Fact) -> Self {
        if !self.contents.facts.contains(&fact) {
            self.contents.facts.push(fact);
        }
        self
    }

    /// Add a rule. Duplicates are ignored.
    #[must_use]
    pub fn rule(mut self, rule: Rule) -> Self {
        if !self.contents.rules.contains(&rule) {
            self.contents.rules.push(rule);
        }
        self
    }

    /// Add a check. Duplicates are ignored.
    #[must_use]
    pub fn check(mut self, check: Check) -> Self {
        if !self.contents.checks.contains(&check) {
            self.contents.checks.push(check);
        }
        self
    }

    /// Label the block. Labels are carried but never evaluated.
    #[must_use]
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.contents.context = Some(context.into());
        self
    }

    /// Add every fact, rule and check in `source`. Policies are not allowed
    /// in blocks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Syntax`] if `source` does not parse or contains a
    /// policy.
    pub fn code(self, source: &str) -> Result<Self, Error> {
        Statement::parse_all(source)?
            .into_iter()
            .try_fold(self, |builder, statement| match statement {
                Statement::Fact(fact) => Ok(builder.fact(fact)),
                Statement::Rule(rule) => Ok(builder.rule(rule)),
                Statement::Check(check) => Ok(builder.check(check)),
                Statement::Policy(policy) => Err(Error::Syntax(SyntaxError::UnexpectedStatement {
                    expected: "fact, rule or check",
                    found: policy.to_string(),
                })),
            })
    }

    /// Finish the block. Statements keep the order they were added in.
    #[must_use]
    pub fn build(self) -> BlockContents {
        self.contents
    }
}

/// A signed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub(crate) contents: BlockContents,
    /// The exact encoding of `contents` that was signed.
    pub(crate) data: Vec<u8>,
    pub(crate) next_key: PublicKey,
    pub(crate) signature: Signature,
}

impl Block {
    pub fn contents(&self) -> &BlockContents {
        &self.contents
    }

    /// The key that must verify the block after this one (or the token's
    /// proof, for the last block).
    pub fn next_key(&self) -> &PublicKey {
        &self.next_key
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn identifier(&self) -> RevocationId {
        RevocationId::of(&self.signature)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "// identifier: {}", self.identifier())?;
        if let Some(context) = self.contents.context() {
            writeln!(f, "// context: {context}")?;
        }
        for fact in &self.contents.facts {
            writeln!(f, "{fact};")?;
        }
        for rule in &self.contents.rules {
            writeln!(f, "{rule};")?;
        }
        for check in &self.contents.checks {
            writeln!(f, "{check};")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_refuses_policies_in_blocks() {
        let result = BlockBuilder::new().code(r#"allow if user("admin")"#);
        assert!(matches!(
            result,
            Err(Error::Syntax(SyntaxError::UnexpectedStatement { .. }))
        ));
    }

    #[test]
    fn it_keeps_statements_in_declaration_order_without_duplicates() {
        let contents = BlockBuilder::new()
            .code(r#"b("2"); a("1"); b("2")"#)
            .unwrap()
            .build();
        let names = contents
            .facts()
            .iter()
            .map(|fact| fact.name())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn contents_decode_only_from_their_own_encoding() {
        let contents = BlockBuilder::new()
            .code(r#"user("admin"); check if operation("read")"#)
            .unwrap()
            .context("demo")
            .build();
        let data = contents.encode().unwrap();
        assert_eq!(BlockContents::decode(&data).unwrap(), contents);

        let mut truncated = data.clone();
        truncated.pop();
        assert!(matches!(
            BlockContents::decode(&truncated),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn contents_with_unprintable_dates_do_not_decode() {
        use cachet_datalog::{MAX_DATE, Value};

        let latest = BlockBuilder::new()
            .fact(Fact::new("expires", [Value::Date(MAX_DATE)]))
            .build();
        let data = latest.encode().unwrap();
        assert_eq!(BlockContents::decode(&data).unwrap(), latest);

        let later = BlockBuilder::new()
            .fact(Fact::new("expires", [Value::Date(MAX_DATE + 1)]))
            .build();
        let data = later.encode().unwrap();
        assert!(matches!(
            BlockContents::decode(&data),
            Err(Error::Malformed(_))
        ));
    }
}
