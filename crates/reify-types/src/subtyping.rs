//! Subtyping rules for the Reify type registry
//!
//! Implements the subtyping relation T <: U (T is a subtype of U) over
//! nominal classes (through the registered hierarchy), generic instances
//! (covariant in their type arguments) and structural function types.

use crate::context::TypeContext;
use crate::ty::{ClassType, FunctionType, Type, TypeId};

/// Context for checking subtyping relationships
#[derive(Debug, Clone, Copy)]
pub struct SubtypingContext<'a> {
    /// Type context for resolving types
    type_ctx: &'a TypeContext,
}

impl<'a> SubtypingContext<'a> {
    /// Create a new subtyping context
    pub fn new(type_ctx: &'a TypeContext) -> Self {
        SubtypingContext { type_ctx }
    }

    /// Check if `sub` is a subtype of `sup` (sub <: sup)
    ///
    /// Returns true if a value of type `sub` can be used where `sup` is expected.
    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        // Reflexivity: T <: T
        if sub == sup {
            return true;
        }

        let (Some(sub_ty), Some(sup_ty)) = (self.type_ctx.get(sub), self.type_ctx.get(sup)) else {
            return false;
        };

        match (sub_ty, sup_ty) {
            // Everything is a subtype of the top types
            (_, Type::Dynamic) | (_, Type::Void) => true,

            // Bottom is a subtype of everything
            (Type::Bottom, _) => true,

            // dynamic and void are only below the top types
            (Type::Dynamic, _) | (Type::Void, _) => sup == TypeId::OBJECT,

            (_, Type::Bottom) => false,

            // Every function type is a Function and an Object
            (Type::Function(_), Type::Class(_)) => sup == TypeId::FUNCTION || sup == TypeId::OBJECT,

            (Type::Function(f1), Type::Function(f2)) => self.is_function_subtype(f1, f2),

            (Type::Class(c1), Type::Class(c2)) => self.is_class_subtype(sub, c1, sup, c2),

            (Type::Class(_), Type::Function(_)) => false,
        }
    }

    /// Nominal subtyping: walk supertype and interfaces; generic instances of
    /// the same class compare their arguments covariantly.
    fn is_class_subtype(&self, sub: TypeId, c1: &ClassType, sup: TypeId, c2: &ClassType) -> bool {
        if sup == TypeId::OBJECT {
            return true;
        }

        if c1.same_declaration(c2) && !c1.type_args.is_empty() {
            return c1
                .type_args
                .iter()
                .zip(&c2.type_args)
                .all(|(&a1, &a2)| self.is_subtype(a1, a2));
        }

        let Some(hierarchy) = self.type_ctx.hierarchy(sub) else {
            return false;
        };

        if let Some(parent) = hierarchy.supertype {
            if self.is_subtype(parent, sup) {
                return true;
            }
        }

        hierarchy
            .interfaces
            .iter()
            .any(|&interface| self.is_subtype(interface, sup))
    }

    /// Function subtyping (contravariant in parameters, covariant in return type)
    fn is_function_subtype(&self, f1: &FunctionType, f2: &FunctionType) -> bool {
        if f2.returns != TypeId::VOID && !self.is_subtype(f1.returns, f2.returns) {
            return false;
        }

        // f1 may not demand more arguments than an f2 caller must pass...
        if f1.required.len() > f2.required.len() {
            return false;
        }
        // ...and must accept every argument an f2 caller is obliged to pass
        if f1.positional_len() < f2.required.len() {
            return false;
        }

        // Optional positional and named parameters never mix across the relation
        if !f2.optional.is_empty() && !f1.named.is_empty() {
            return false;
        }
        if !f2.named.is_empty() && !f1.optional.is_empty() {
            return false;
        }

        let shared = f1.positional_len().min(f2.positional_len());
        for index in 0..shared {
            let (Some(p1), Some(p2)) = (f1.positional(index), f2.positional(index)) else {
                return false;
            };
            if !self.is_parameter_compatible(p1, p2) {
                return false;
            }
        }

        f2.named.iter().all(|n2| match f1.named_param(&n2.name) {
            Some(n1) => self.is_parameter_compatible(n1, n2.ty),
            None => false,
        })
    }

    /// `sup_param <: sub_param`; a `dynamic` parameter accepts anything
    fn is_parameter_compatible(&self, sub_param: TypeId, sup_param: TypeId) -> bool {
        sub_param == TypeId::DYNAMIC || self.is_subtype(sup_param, sub_param) // Note: reversed!
    }
}
