use crate::dag::DAG;

use num_bigint::BigUint;
use std::any::Any;

/// An opaque callable value sitting at the leaves of the graph. The engine
/// never interprets primitives; it only asks them to apply themselves when
/// one ends up in function position.
pub trait Primitive {
  /// Apply this primitive to an argument. The callee may reduce the
  /// argument through the handle as far as it needs. Returning `None`
  /// declines the application and leaves it in place; returning a value
  /// transfers its ownership to the engine, which wraps it in a fresh node.
  fn apply(&self, arg: &mut DAG) -> Option<Box<dyn Primitive>>;

  /// Display form, used by readback and the GraphViz dump.
  fn symbol(&self) -> String;

  fn as_any(&self) -> &dyn Any;
}

/// A natural number literal. Inert in function position.
pub struct Nat(pub BigUint);

impl Primitive for Nat {
  fn apply(&self, _arg: &mut DAG) -> Option<Box<dyn Primitive>> { None }

  fn symbol(&self) -> String { format!("#{}", self.0) }

  fn as_any(&self) -> &dyn Any { self }
}

/// The successor function on naturals.
pub struct Suc;

impl Primitive for Suc {
  fn apply(&self, arg: &mut DAG) -> Option<Box<dyn Primitive>> {
    arg.hnf();
    let nat = arg.get_prim()?.as_any().downcast_ref::<Nat>()?;
    Some(Box::new(Nat(&nat.0 + 1u32)))
  }

  fn symbol(&self) -> String { String::from("suc") }

  fn as_any(&self) -> &dyn Any { self }
}

/// Curried addition: applying to the first summand yields a partial
/// application primitive.
pub struct Add;

impl Primitive for Add {
  fn apply(&self, arg: &mut DAG) -> Option<Box<dyn Primitive>> {
    arg.hnf();
    let nat = arg.get_prim()?.as_any().downcast_ref::<Nat>()?;
    Some(Box::new(AddTo(nat.0.clone())))
  }

  fn symbol(&self) -> String { String::from("add") }

  fn as_any(&self) -> &dyn Any { self }
}

pub struct AddTo(pub BigUint);

impl Primitive for AddTo {
  fn apply(&self, arg: &mut DAG) -> Option<Box<dyn Primitive>> {
    arg.hnf();
    let nat = arg.get_prim()?.as_any().downcast_ref::<Nat>()?;
    Some(Box::new(Nat(&self.0 + &nat.0)))
  }

  fn symbol(&self) -> String { format!("add {}", self.0) }

  fn as_any(&self) -> &dyn Any { self }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn symbols() {
    assert_eq!(Nat(BigUint::from(42u64)).symbol(), "#42");
    assert_eq!(Suc.symbol(), "suc");
    assert_eq!(AddTo(BigUint::from(7u64)).symbol(), "add 7");
  }
}
