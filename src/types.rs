//! Type registry: atomic types, function signatures, and subtype queries.
//!
//! The [`TypeRegistry`] maps type names to [`TypeDef`]s using a `DashMap`, so it
//! can be shared across threads without an outer lock. Subtyping is the
//! reflexive-transitive closure of the declared supertype graph; signature types
//! with no declared relation are compared structurally (contravariant
//! parameters, covariant return).

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// Name of the built-in top type for individuals.
pub const ENTITY: &str = "Entity";
/// Name of the built-in truth-value type. Statements must have this type.
pub const BOOLEAN: &str = "Boolean";
/// Name of the built-in integer type.
pub const INTEGER: &str = "Integer";
/// Name of the built-in string type.
pub const STRING: &str = "String";

/// A reference to a type by name.
///
/// Cheap to clone (`Arc<str>`); equality is by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ty(Arc<str>);

impl Ty {
    /// Refer to a type by name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The built-in `Entity` type.
    pub fn entity() -> Self {
        Self::new(ENTITY)
    }

    /// The built-in `Boolean` type.
    pub fn boolean() -> Self {
        Self::new(BOOLEAN)
    }

    /// The built-in `Integer` type.
    pub fn integer() -> Self {
        Self::new(INTEGER)
    }

    /// The built-in `String` type.
    pub fn string() -> Self {
        Self::new(STRING)
    }

    /// The type name.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Whether this is the `Boolean` type (by name, not by subtyping).
    pub fn is_boolean(&self) -> bool {
        &*self.0 == BOOLEAN
    }
}

impl std::fmt::Display for Ty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An ordered parameter list plus a return type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Parameter types in argument order.
    pub params: Vec<Ty>,
    /// Result type of an application.
    pub returns: Ty,
}

impl Signature {
    /// Number of parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> {}", self.returns)
    }
}

/// A declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    /// Unique name.
    pub name: Ty,
    /// Direct supertypes.
    pub supertypes: Vec<Ty>,
    /// Function signature, for types of applicable terms.
    pub signature: Option<Signature>,
}

/// Registry of declared types.
pub struct TypeRegistry {
    types: DashMap<Ty, TypeDef>,
}

impl TypeRegistry {
    /// Create a registry holding only the built-in types.
    pub fn new() -> Self {
        let registry = Self::empty();
        for name in [ENTITY, BOOLEAN, INTEGER, STRING] {
            let ty = Ty::new(name);
            registry.types.insert(
                ty.clone(),
                TypeDef {
                    name: ty,
                    supertypes: Vec::new(),
                    signature: None,
                },
            );
        }
        registry
    }

    /// Create a registry with no types at all, not even the built-ins.
    pub fn empty() -> Self {
        Self {
            types: DashMap::new(),
        }
    }

    /// Declare an atomic type with the given direct supertypes.
    pub fn define_atomic_type(&self, name: &str, supertypes: &[&str]) -> TypeResult<Ty> {
        let supertypes = self.resolve_all(supertypes)?;
        self.insert(TypeDef {
            name: Ty::new(name),
            supertypes,
            signature: None,
        })
    }

    /// Declare a function type named `name` with the given signature.
    pub fn define_function_signature(
        &self,
        name: &str,
        param_types: &[&str],
        return_type: &str,
    ) -> TypeResult<Ty> {
        let params = self.resolve_all(param_types)?;
        let returns = self.resolve(return_type)?;
        self.insert(TypeDef {
            name: Ty::new(name),
            supertypes: Vec::new(),
            signature: Some(Signature { params, returns }),
        })
    }

    fn insert(&self, def: TypeDef) -> TypeResult<Ty> {
        let name = def.name.clone();
        match self.types.entry(name.clone()) {
            Entry::Occupied(_) => Err(TypeError::DuplicateType {
                name: name.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(def);
                Ok(name)
            }
        }
    }

    fn resolve(&self, name: &str) -> TypeResult<Ty> {
        let ty = Ty::new(name);
        if self.types.contains_key(&ty) {
            Ok(ty)
        } else {
            Err(TypeError::UnknownType { name: name.into() })
        }
    }

    fn resolve_all(&self, names: &[&str]) -> TypeResult<Vec<Ty>> {
        names.iter().map(|n| self.resolve(n)).collect()
    }

    /// Look up a type definition by name.
    pub fn get_type(&self, name: &str) -> Option<TypeDef> {
        self.types.get(&Ty::new(name)).map(|r| r.value().clone())
    }

    /// Whether a type with this name is declared.
    pub fn contains(&self, ty: &Ty) -> bool {
        self.types.contains_key(ty)
    }

    /// The signature of a function type, if it has one.
    pub fn signature_of(&self, ty: &Ty) -> Option<Signature> {
        self.types.get(ty).and_then(|r| r.value().signature.clone())
    }

    /// Whether `a` is a subtype of `b`.
    ///
    /// Reflexive and transitive; terminates on cyclic supertype declarations.
    pub fn is_subtype(&self, a: &Ty, b: &Ty) -> bool {
        let mut assumed = HashSet::new();
        self.is_subtype_inner(a, b, &mut assumed)
    }

    fn is_subtype_inner(&self, a: &Ty, b: &Ty, assumed: &mut HashSet<(Ty, Ty)>) -> bool {
        if a == b || self.declared_ancestor(a, b) {
            return true;
        }
        // Signature types compared structurally. A pair already under comparison
        // is assumed to hold, so mutually recursive signatures terminate.
        if !assumed.insert((a.clone(), b.clone())) {
            return true;
        }
        let (Some(sa), Some(sb)) = (self.signature_of(a), self.signature_of(b)) else {
            return false;
        };
        sa.arity() == sb.arity()
            && sa
                .params
                .iter()
                .zip(&sb.params)
                .all(|(pa, pb)| self.is_subtype_inner(pb, pa, assumed))
            && self.is_subtype_inner(&sa.returns, &sb.returns, assumed)
    }

    /// Breadth-first search up the declared supertype graph.
    fn declared_ancestor(&self, a: &Ty, b: &Ty) -> bool {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(a.clone());
        queue.push_back(a.clone());

        while let Some(current) = queue.pop_front() {
            let supertypes = match self.types.get(&current) {
                Some(def) => def.value().supertypes.clone(),
                None => continue,
            };
            for sup in supertypes {
                if &sup == b {
                    return true;
                }
                if visited.insert(sup.clone()) {
                    queue.push_back(sup);
                }
            }
        }
        false
    }

    /// Whether either type is a subtype of the other: the unifier's type gate.
    pub fn are_compatible(&self, a: &Ty, b: &Ty) -> bool {
        self.is_subtype(a, b) || self.is_subtype(b, a)
    }

    /// All declared types, sorted by name.
    pub fn all(&self) -> Vec<TypeDef> {
        let mut all: Vec<TypeDef> = self.types.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Number of declared types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("count", &self.len())
            .finish()
    }
}
