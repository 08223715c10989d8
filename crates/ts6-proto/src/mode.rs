//! Mode-string parsing against a parameter-arity table.
//!
//! Which letters consume a positional argument is not fixed by the protocol;
//! it follows from the feature sets servers advertise:
//!
//! - `PREFIX=(ov)@+` letters take a parameter when added and when removed
//! - `CHANMODES=A,B,C,D`:
//!   - A (list modes such as `b`) take a parameter both ways
//!   - B (such as `k`) take a parameter both ways
//!   - C (such as `l`) take a parameter only when set
//!   - D take no parameter

use crate::error::ModeError;

/// Charybdis' advertised `PREFIX`.
pub const DEFAULT_PREFIX: &str = "(ov)@+";

/// Charybdis' advertised `CHANMODES`.
pub const DEFAULT_CHANMODES: &str = "eIbq,k,flj,CFLMPQScgimnprstz";

/// Parameter arity class of a mode letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeClass {
    /// Member status (`o`, `v`); parameter is a member.
    Prefix,
    /// Address list (`b`, `e`, `I`, `q`).
    List,
    /// Parameter on set and unset (`k`).
    AlwaysParam,
    /// Parameter on set only (`l`, `f`, `j`).
    SetOnlyParam,
    /// No parameter.
    Flag,
}

impl ModeClass {
    /// Whether a letter of this class consumes an argument.
    pub fn takes_param(self, adding: bool) -> bool {
        match self {
            ModeClass::Prefix | ModeClass::List | ModeClass::AlwaysParam => true,
            ModeClass::SetOnlyParam => adding,
            ModeClass::Flag => false,
        }
    }
}

/// Letter → arity table built from `PREFIX` and `CHANMODES`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeTable {
    /// `(letter, symbol)` pairs in rank order.
    prefixes: Vec<(char, char)>,
    lists: String,
    always: String,
    set_only: String,
    flags: String,
    /// Accept any letter as a [`ModeClass::Flag`] (user modes).
    permissive: bool,
}

impl ModeTable {
    /// Build from raw `PREFIX` and `CHANMODES` values.
    ///
    /// ```rust
    /// use ts6_proto::{ModeClass, ModeTable};
    ///
    /// let table = ModeTable::from_features("(qaohv)~&@%+", "beI,k,l,imnpst").unwrap();
    /// assert_eq!(table.classify('h'), Some(ModeClass::Prefix));
    /// assert_eq!(table.classify('l'), Some(ModeClass::SetOnlyParam));
    /// ```
    pub fn from_features(prefix: &str, chanmodes: &str) -> Result<Self, ModeError> {
        let bad = || ModeError::BadFeatureToken(prefix.to_string());
        let body = prefix.strip_prefix('(').ok_or_else(bad)?;
        let (letters, symbols) = body.split_once(')').ok_or_else(bad)?;
        if letters.chars().count() != symbols.chars().count() {
            return Err(bad());
        }
        let prefixes = letters.chars().zip(symbols.chars()).collect();

        let groups: Vec<&str> = chanmodes.split(',').collect();
        if groups.len() < 4 {
            return Err(ModeError::BadFeatureToken(chanmodes.to_string()));
        }

        Ok(Self {
            prefixes,
            lists: groups[0].to_string(),
            always: groups[1].to_string(),
            set_only: groups[2].to_string(),
            // Groups past D are reserved; their letters take no parameter.
            flags: groups[3..].concat(),
            permissive: false,
        })
    }

    /// A table for user modes: every letter is a parameterless flag.
    pub fn user_modes() -> Self {
        Self {
            prefixes: Vec::new(),
            lists: String::new(),
            always: String::new(),
            set_only: String::new(),
            flags: String::new(),
            permissive: true,
        }
    }

    /// Merge two tables. Letters known to `self` keep their class.
    pub fn union(&self, other: &ModeTable) -> ModeTable {
        let mut merged = self.clone();
        for &(letter, symbol) in &other.prefixes {
            if merged.classify(letter).is_none() {
                merged.prefixes.push((letter, symbol));
            }
        }
        for (target, source) in [
            (&mut merged.lists, &other.lists),
            (&mut merged.always, &other.always),
            (&mut merged.set_only, &other.set_only),
            (&mut merged.flags, &other.flags),
        ] {
            for c in source.chars() {
                if !self.knows(c) && !target.contains(c) {
                    target.push(c);
                }
            }
        }
        merged.permissive = self.permissive || other.permissive;
        merged
    }

    fn knows(&self, letter: char) -> bool {
        self.prefixes.iter().any(|&(l, _)| l == letter)
            || self.lists.contains(letter)
            || self.always.contains(letter)
            || self.set_only.contains(letter)
            || self.flags.contains(letter)
    }

    /// Class of `letter`, or `None` if the table does not permit it.
    pub fn classify(&self, letter: char) -> Option<ModeClass> {
        if self.prefixes.iter().any(|&(l, _)| l == letter) {
            Some(ModeClass::Prefix)
        } else if self.lists.contains(letter) {
            Some(ModeClass::List)
        } else if self.always.contains(letter) {
            Some(ModeClass::AlwaysParam)
        } else if self.set_only.contains(letter) {
            Some(ModeClass::SetOnlyParam)
        } else if self.flags.contains(letter) || (self.permissive && letter.is_ascii_alphabetic()) {
            Some(ModeClass::Flag)
        } else {
            None
        }
    }

    /// Status letter for a member prefix symbol (`@` → `o`).
    pub fn letter_for_symbol(&self, symbol: char) -> Option<char> {
        self.prefixes
            .iter()
            .find(|&&(_, s)| s == symbol)
            .map(|&(l, _)| l)
    }

    /// Prefix symbol for a status letter (`v` → `+`).
    pub fn symbol_for_letter(&self, letter: char) -> Option<char> {
        self.prefixes
            .iter()
            .find(|&&(l, _)| l == letter)
            .map(|&(_, s)| s)
    }

    /// Rank of a status letter; lower is higher.
    pub fn prefix_rank(&self, letter: char) -> Option<usize> {
        self.prefixes.iter().position(|&(l, _)| l == letter)
    }
}

impl Default for ModeTable {
    fn default() -> Self {
        Self {
            prefixes: vec![('o', '@'), ('v', '+')],
            lists: "eIbq".to_string(),
            always: "k".to_string(),
            set_only: "flj".to_string(),
            flags: "CFLMPQScgimnprstz".to_string(),
            permissive: false,
        }
    }
}

/// The result of parsing a mode string: ordered additions and removals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeChange {
    /// Letters set, in string order.
    pub added: Vec<(char, Option<String>)>,
    /// Letters unset, in string order.
    pub removed: Vec<(char, Option<String>)>,
}

impl ModeChange {
    /// True when neither side carries a letter.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Render back into `+letters-letters args...` form.
    pub fn render(&self) -> String {
        let mut letters = String::new();
        let mut args = Vec::new();
        for (sign, side) in [('+', &self.added), ('-', &self.removed)] {
            if side.is_empty() {
                continue;
            }
            letters.push(sign);
            for (letter, param) in side {
                letters.push(*letter);
                if let Some(param) = param {
                    args.push(param.as_str());
                }
            }
        }
        if letters.is_empty() {
            letters.push('+');
        }
        if args.is_empty() {
            letters
        } else {
            format!("{} {}", letters, args.join(" "))
        }
    }
}

/// Tokenize `modes` plus positional `args` against `table`.
///
/// A bare `+` or `-` yields an empty change; burst lines use `+` to mean
/// "no modes".
pub fn parse_modes<S: AsRef<str>>(
    table: &ModeTable,
    modes: &str,
    args: &[S],
) -> Result<ModeChange, ModeError> {
    let mut chars = modes.chars();
    let mut adding = match chars.next() {
        None => return Err(ModeError::Empty),
        Some('+') => true,
        Some('-') => false,
        Some(_) => return Err(ModeError::MissingDirection(modes.to_string())),
    };

    let mut args = args.iter().map(|a| a.as_ref().to_string());
    let mut change = ModeChange::default();

    for c in chars {
        match c {
            '+' => adding = true,
            '-' => adding = false,
            letter => {
                let class = table.classify(letter).ok_or(ModeError::UnknownMode(letter))?;
                let param = if class.takes_param(adding) {
                    Some(args.next().ok_or(ModeError::MissingParam(letter))?)
                } else {
                    None
                };
                if adding {
                    change.added.push((letter, param));
                } else {
                    change.removed.push((letter, param));
                }
            }
        }
    }

    let leftover: Vec<String> = args.collect();
    if !leftover.is_empty() {
        return Err(ModeError::TooManyParams(leftover));
    }

    Ok(change)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ModeTable {
        ModeTable::default()
    }

    // ========================================================================
    // Arity classes
    // ========================================================================

    #[test]
    fn prefix_and_list_take_params_both_ways() {
        let change = parse_modes(&table(), "+o-v+b-b", &["A", "B", "*!*@x", "*!*@y"]).unwrap();
        assert_eq!(
            change.added,
            vec![('o', Some("A".into())), ('b', Some("*!*@x".into()))]
        );
        assert_eq!(
            change.removed,
            vec![('v', Some("B".into())), ('b', Some("*!*@y".into()))]
        );
    }

    #[test]
    fn key_takes_param_on_removal() {
        let change = parse_modes(&table(), "-k", &["secret"]).unwrap();
        assert_eq!(change.removed, vec![('k', Some("secret".into()))]);
    }

    #[test]
    fn limit_takes_param_only_when_set() {
        let change = parse_modes(&table(), "+l-l", &["25"]).unwrap();
        assert_eq!(change.added, vec![('l', Some("25".into()))]);
        assert_eq!(change.removed, vec![('l', None)]);
    }

    #[test]
    fn flags_take_nothing() {
        let change = parse_modes::<&str>(&table(), "+nt-m", &[]).unwrap();
        assert_eq!(change.added, vec![('n', None), ('t', None)]);
        assert_eq!(change.removed, vec![('m', None)]);
    }

    // ========================================================================
    // Failures
    // ========================================================================

    #[test]
    fn missing_param_is_rejected() {
        assert_eq!(
            parse_modes::<&str>(&table(), "+k", &[]),
            Err(ModeError::MissingParam('k'))
        );
        assert_eq!(
            parse_modes(&table(), "+ov", &["A"]),
            Err(ModeError::MissingParam('v'))
        );
    }

    #[test]
    fn unknown_letter_is_rejected() {
        assert_eq!(
            parse_modes::<&str>(&table(), "+nY", &[]),
            Err(ModeError::UnknownMode('Y'))
        );
    }

    #[test]
    fn leftover_args_are_rejected() {
        assert_eq!(
            parse_modes(&table(), "+n", &["extra"]),
            Err(ModeError::TooManyParams(vec!["extra".into()]))
        );
    }

    #[test]
    fn direction_is_required() {
        assert_eq!(parse_modes::<&str>(&table(), "", &[]), Err(ModeError::Empty));
        assert!(matches!(
            parse_modes::<&str>(&table(), "nt", &[]),
            Err(ModeError::MissingDirection(_))
        ));
    }

    #[test]
    fn bare_plus_is_empty() {
        assert!(parse_modes::<&str>(&table(), "+", &[]).unwrap().is_empty());
    }

    // ========================================================================
    // Tables
    // ========================================================================

    #[test]
    fn features_round_into_classes() {
        let t = ModeTable::from_features("(qaohv)~&@%+", "beI,k,l,imnpst").unwrap();
        assert_eq!(t.classify('q'), Some(ModeClass::Prefix));
        assert_eq!(t.classify('e'), Some(ModeClass::List));
        assert_eq!(t.classify('k'), Some(ModeClass::AlwaysParam));
        assert_eq!(t.classify('l'), Some(ModeClass::SetOnlyParam));
        assert_eq!(t.classify('s'), Some(ModeClass::Flag));
        assert_eq!(t.classify('z'), None);
        assert_eq!(t.letter_for_symbol('%'), Some('h'));
        assert_eq!(t.symbol_for_letter('a'), Some('&'));
    }

    #[test]
    fn malformed_features_are_rejected() {
        assert!(ModeTable::from_features("ov@+", DEFAULT_CHANMODES).is_err());
        assert!(ModeTable::from_features("(ov)@", DEFAULT_CHANMODES).is_err());
        assert!(ModeTable::from_features(DEFAULT_PREFIX, "b,k,l").is_err());
    }

    #[test]
    fn default_matches_charybdis_features() {
        let parsed = ModeTable::from_features(DEFAULT_PREFIX, DEFAULT_CHANMODES).unwrap();
        assert_eq!(parsed, ModeTable::default());
    }

    #[test]
    fn union_adds_foreign_letters() {
        let ours = ModeTable::from_features("(ov)@+", "b,k,l,nt").unwrap();
        let theirs = ModeTable::from_features("(aov)&@+", "bq,k,lj,ntz").unwrap();
        let merged = ours.union(&theirs);
        assert_eq!(merged.classify('a'), Some(ModeClass::Prefix));
        assert_eq!(merged.classify('q'), Some(ModeClass::List));
        assert_eq!(merged.classify('j'), Some(ModeClass::SetOnlyParam));
        assert_eq!(merged.classify('z'), Some(ModeClass::Flag));
        assert_eq!(merged.symbol_for_letter('o'), Some('@'));
    }

    #[test]
    fn user_table_accepts_any_letter() {
        let change = parse_modes::<&str>(&ModeTable::user_modes(), "+iwZ-x", &[]).unwrap();
        assert_eq!(change.added.len(), 3);
        assert_eq!(change.removed, vec![('x', None)]);
    }

    #[test]
    fn render_reassembles() {
        let change = parse_modes(&table(), "+nk-o", &["key", "A"]).unwrap();
        assert_eq!(change.render(), "+nk-o key A");
        assert_eq!(ModeChange::default().render(), "+");
    }
}
