//! Structural analysis of the start pattern.
//!
//! One walk computes, per composite pattern, its first and last leaf sets,
//! its full leaf set, and nullability, while collecting the side tables
//! constraint emission needs: the legal consecutive-leaf pairs, the
//! superposition membership maps, the repetition/optional spans, and the
//! immediate parent of every reachable token leaf (for state labels).

use hashbrown::{HashMap, HashSet};

use braggi_error::{BraggiError, Result};
use braggi_pattern::{PatternKind, PatternLibrary};
use braggi_types::{ConstraintKind, PatternId};

/// First/last/leaf sets and nullability of one pattern.
#[derive(Debug, Clone, Default)]
pub struct Shape {
    pub firsts: HashSet<PatternId>,
    pub lasts: HashSet<PatternId>,
    pub leaves: HashSet<PatternId>,
    pub nullable: bool,
}

impl Shape {
    fn leaf(id: PatternId) -> Self {
        let mut set = HashSet::new();
        set.insert(id);
        Self {
            firsts: set.clone(),
            lasts: set.clone(),
            leaves: set,
            nullable: false,
        }
    }

    fn empty(nullable: bool) -> Self {
        Self {
            nullable,
            ..Self::default()
        }
    }
}

/// Walks patterns from the start, memoising shapes and collecting the
/// side tables. `Reference` edges resolve lazily by name; a visiting set
/// stops cyclic walks instead of recursing forever.
pub struct Analyzer<'lib> {
    library: &'lib PatternLibrary,
    memo: HashMap<PatternId, Shape>,
    visiting: HashSet<PatternId>,
    parents: HashMap<PatternId, String>,
    followers: HashSet<(PatternId, PatternId)>,
    exclusions: Vec<(String, HashMap<PatternId, usize>)>,
    cardinalities: Vec<(String, HashSet<PatternId>, usize, Option<usize>)>,
    biases: Vec<(String, ConstraintKind, i8, HashSet<PatternId>)>,
}

impl<'lib> Analyzer<'lib> {
    pub fn new(library: &'lib PatternLibrary) -> Self {
        Self {
            library,
            memo: HashMap::new(),
            visiting: HashSet::new(),
            parents: HashMap::new(),
            followers: HashSet::new(),
            exclusions: Vec::new(),
            cardinalities: Vec::new(),
            biases: Vec::new(),
        }
    }

    /// The immediate parent pattern name recorded for a reachable leaf.
    pub fn parent_of(&self, leaf: PatternId) -> Option<&str> {
        self.parents.get(&leaf).map(String::as_str)
    }

    pub fn take_followers(&mut self) -> HashSet<(PatternId, PatternId)> {
        std::mem::take(&mut self.followers)
    }

    pub fn take_exclusions(&mut self) -> Vec<(String, HashMap<PatternId, usize>)> {
        std::mem::take(&mut self.exclusions)
    }

    pub fn take_cardinalities(
        &mut self,
    ) -> Vec<(String, HashSet<PatternId>, usize, Option<usize>)> {
        std::mem::take(&mut self.cardinalities)
    }

    pub fn take_biases(&mut self) -> Vec<(String, ConstraintKind, i8, HashSet<PatternId>)> {
        std::mem::take(&mut self.biases)
    }

    /// A Predicate among a composite's children biases the collapse order
    /// of the composite's leaves.
    fn record_predicates(
        &mut self,
        owner: &str,
        children: &[PatternId],
        leaves: &HashSet<PatternId>,
    ) {
        let library = self.library;
        for &child in children {
            if let Some(pattern) = library.get(child) {
                if let PatternKind::Predicate { kind, bias } = &pattern.kind {
                    self.biases
                        .push((owner.to_owned(), *kind, *bias, leaves.clone()));
                }
            }
        }
    }

    /// Shape of a pattern, walking its sub-patterns on first visit.
    pub fn shape(&mut self, id: PatternId, parent_name: &str) -> Result<Shape> {
        if let Some(shape) = self.memo.get(&id) {
            return Ok(shape.clone());
        }
        if !self.visiting.insert(id) {
            // A cycle through Reference edges; treat the back-edge as
            // opaque rather than recursing.
            return Ok(Shape::empty(false));
        }
        let library = self.library;
        let pattern = library
            .get(id)
            .ok_or_else(|| BraggiError::internal(format!("pattern id {id} out of range")))?;

        let shape = match &pattern.kind {
            PatternKind::Token { .. } => {
                self.parents
                    .entry(id)
                    .or_insert_with(|| parent_name.to_owned());
                Shape::leaf(id)
            }
            PatternKind::Sequence(elems) => {
                let mut parts = Vec::with_capacity(elems.len());
                for &elem in elems {
                    parts.push(self.shape(elem, &pattern.name)?);
                }
                // Followers: every last of part i may precede every first
                // of the next non-skipped part, skipping nullable parts.
                for i in 0..parts.len() {
                    let mut j = i + 1;
                    while j < parts.len() {
                        for &last in &parts[i].lasts {
                            for &first in &parts[j].firsts {
                                self.followers.insert((last, first));
                            }
                        }
                        if parts[j].nullable {
                            j += 1;
                        } else {
                            break;
                        }
                    }
                }
                let mut firsts = HashSet::new();
                for part in &parts {
                    firsts.extend(part.firsts.iter().copied());
                    if !part.nullable {
                        break;
                    }
                }
                let mut lasts = HashSet::new();
                for part in parts.iter().rev() {
                    lasts.extend(part.lasts.iter().copied());
                    if !part.nullable {
                        break;
                    }
                }
                let mut leaves = HashSet::new();
                let mut nullable = true;
                for part in &parts {
                    leaves.extend(part.leaves.iter().copied());
                    nullable &= part.nullable;
                }
                self.record_predicates(&pattern.name, elems, &leaves);
                Shape {
                    firsts,
                    lasts,
                    leaves,
                    nullable,
                }
            }
            PatternKind::Superposition(alts) => {
                let mut members: HashMap<PatternId, usize> = HashMap::new();
                let mut combined = Shape::empty(false);
                for (alt_index, &alt) in alts.iter().enumerate() {
                    let part = self.shape(alt, &pattern.name)?;
                    for &leaf in &part.leaves {
                        members.entry(leaf).or_insert(alt_index);
                    }
                    combined.firsts.extend(part.firsts.iter().copied());
                    combined.lasts.extend(part.lasts.iter().copied());
                    combined.leaves.extend(part.leaves.iter().copied());
                    combined.nullable |= part.nullable;
                }
                self.exclusions.push((pattern.name.clone(), members));
                self.record_predicates(&pattern.name, alts, &combined.leaves);
                combined
            }
            PatternKind::Repetition(inner) => {
                let part = self.shape(*inner, &pattern.name)?;
                // The loop back-edge: the repetition's lasts may precede
                // its firsts.
                for &last in &part.lasts {
                    for &first in &part.firsts {
                        self.followers.insert((last, first));
                    }
                }
                self.cardinalities
                    .push((pattern.name.clone(), part.leaves.clone(), 0, None));
                Shape {
                    nullable: true,
                    ..part
                }
            }
            PatternKind::Optional(inner) => {
                let part = self.shape(*inner, &pattern.name)?;
                self.cardinalities
                    .push((pattern.name.clone(), part.leaves.clone(), 0, Some(1)));
                Shape {
                    nullable: true,
                    ..part
                }
            }
            PatternKind::Group { label, inner } => {
                // A group renames the derivation its leaves report.
                self.shape(*inner, label)?
            }
            PatternKind::Reference(target) => {
                let resolved = library.resolve(target)?;
                self.shape(resolved, parent_name)?
            }
            PatternKind::Predicate { .. } => Shape::empty(true),
        };

        self.visiting.remove(&id);
        self.memo.insert(id, shape.clone());
        Ok(shape)
    }
}

#[cfg(test)]
mod tests {
    use braggi_types::TokenKind;

    use super::*;

    #[test]
    fn sequence_firsts_skip_nullable_prefixes() {
        let mut lib = PatternLibrary::new();
        let a = lib.token_text("tok_a", TokenKind::Identifier, "a").unwrap();
        let b = lib.token_text("tok_b", TokenKind::Identifier, "b").unwrap();
        let opt_a = lib.optional("opt_a", a).unwrap();
        let seq = lib.sequence("seq", vec![opt_a, b]).unwrap();
        lib.set_start("seq").unwrap();

        let mut analyzer = Analyzer::new(&lib);
        let shape = analyzer.shape(seq, "").unwrap();
        assert!(shape.firsts.contains(&a));
        assert!(shape.firsts.contains(&b));
        assert_eq!(shape.lasts, [b].into_iter().collect());
        assert!(!shape.nullable);
    }

    #[test]
    fn sequence_followers_skip_nullable_middles() {
        let mut lib = PatternLibrary::new();
        let a = lib.token_text("tok_a", TokenKind::Identifier, "a").unwrap();
        let b = lib.token_text("tok_b", TokenKind::Identifier, "b").unwrap();
        let c = lib.token_text("tok_c", TokenKind::Identifier, "c").unwrap();
        let opt_b = lib.optional("opt_b", b).unwrap();
        let seq = lib.sequence("seq", vec![a, opt_b, c]).unwrap();
        lib.set_start("seq").unwrap();

        let mut analyzer = Analyzer::new(&lib);
        analyzer.shape(seq, "").unwrap();
        let followers = analyzer.take_followers();
        assert!(followers.contains(&(a, b)));
        assert!(followers.contains(&(b, c)));
        // b is optional, so a may directly precede c.
        assert!(followers.contains(&(a, c)));
        assert!(!followers.contains(&(c, a)));
    }

    #[test]
    fn repetition_adds_the_loop_edge_and_a_span() {
        let mut lib = PatternLibrary::new();
        let a = lib.token_text("tok_a", TokenKind::Identifier, "a").unwrap();
        let rep = lib.repetition("rep_a", a).unwrap();
        lib.set_start("rep_a").unwrap();

        let mut analyzer = Analyzer::new(&lib);
        let shape = analyzer.shape(rep, "").unwrap();
        assert!(shape.nullable);
        assert!(analyzer.take_followers().contains(&(a, a)));
        let spans = analyzer.take_cardinalities();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].0, "rep_a");
        assert_eq!(spans[0].3, None);
    }

    #[test]
    fn superposition_records_alternative_membership() {
        let mut lib = PatternLibrary::new();
        let a = lib.token_text("tok_a", TokenKind::Identifier, "a").unwrap();
        let b = lib.token_text("tok_b", TokenKind::Identifier, "b").unwrap();
        let sup = lib.superposition("choice", vec![a, b]).unwrap();
        lib.set_start("choice").unwrap();

        let mut analyzer = Analyzer::new(&lib);
        analyzer.shape(sup, "").unwrap();
        let exclusions = analyzer.take_exclusions();
        assert_eq!(exclusions.len(), 1);
        let (name, members) = &exclusions[0];
        assert_eq!(name, "choice");
        assert_eq!(members.get(&a), Some(&0));
        assert_eq!(members.get(&b), Some(&1));
    }

    #[test]
    fn cyclic_references_terminate() {
        let mut lib = PatternLibrary::new();
        let a = lib.token_text("tok_a", TokenKind::Identifier, "a").unwrap();
        let expr_ref = lib.reference("expr_ref", "expr").unwrap();
        let seq = lib.sequence("expr", vec![a, expr_ref]).unwrap();
        lib.set_start("expr").unwrap();

        let mut analyzer = Analyzer::new(&lib);
        let shape = analyzer.shape(seq, "").unwrap();
        assert!(shape.firsts.contains(&a));
        assert!(!shape.nullable);
    }

    #[test]
    fn group_relabels_its_leaves() {
        let mut lib = PatternLibrary::new();
        let a = lib.token("ident", TokenKind::Identifier).unwrap();
        let grp = lib.group("grp", "binding", a).unwrap();
        let seq = lib.sequence("program", vec![grp]).unwrap();
        lib.set_start("program").unwrap();

        let mut analyzer = Analyzer::new(&lib);
        analyzer.shape(seq, "").unwrap();
        assert_eq!(analyzer.parent_of(a), Some("binding"));
    }
}
