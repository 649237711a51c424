//! Walking parsed subcommand chains and splitting chained invocations.

use clap::ArgMatches;

/// Every level of the subcommand chain, root first.
///
/// The root entry carries an empty name.
pub fn matches_chain(matches: &ArgMatches) -> Vec<(String, &ArgMatches)> {
    let mut chain = vec![(String::new(), matches)];
    let mut current = matches;

    while let Some((name, sub)) = current.subcommand() {
        chain.push((name.to_string(), sub));
        current = sub;
    }

    chain
}

/// What [`split_chain`] needs to know about the group and its children.
///
/// `head` is the subcommand that opened the current segment, `None` for the
/// group's own leading tokens.
pub trait ChainShape {
    /// True if `token` names a child of the group.
    fn is_child(&self, token: &str) -> bool;

    /// True if `token` is an option of `head` that takes the next token as
    /// its value.
    fn takes_value(&self, head: Option<&str>, token: &str) -> bool;

    /// Positional values `head` needs before another subcommand may start.
    fn positionals(&self, head: Option<&str>) -> usize;
}

/// Splits the tokens of a chained group into the group's own leading
/// tokens and one segment per invoked subcommand.
///
/// A bare token opens a new segment when it names a child and the current
/// segment already holds every positional value it needs. Option values
/// and everything after `--` never open a segment.
pub fn split_chain<S: ChainShape>(tokens: &[String], shape: &S) -> (Vec<String>, Vec<Vec<String>>) {
    let mut prefix = Vec::new();
    let mut segments: Vec<Vec<String>> = Vec::new();
    let mut positionals = 0;
    let mut skip_next = false;
    let mut literal = false;

    for token in tokens {
        let head = segments.last().map(|s| s[0].clone());
        if skip_next {
            skip_next = false;
        } else if literal {
            positionals += 1;
        } else if token == "--" {
            literal = true;
        } else if token.starts_with('-') && token.len() > 1 {
            skip_next = shape.takes_value(head.as_deref(), token);
        } else if shape.is_child(token) && positionals >= shape.positionals(head.as_deref()) {
            segments.push(vec![token.clone()]);
            positionals = 0;
            continue;
        } else {
            positionals += 1;
        }
        match segments.last_mut() {
            Some(seg) => seg.push(token.clone()),
            None => prefix.push(token.clone()),
        }
    }

    (prefix, segments)
}
