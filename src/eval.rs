use crate::{
  dag::*,
  link::*,
  upcopy::*,
};

use std::ptr::NonNull;

// Contract a redex whose function position is a lambda. Every parent of the
// redex is redirected to the contractum; the redex and whatever dies with it
// are released.
pub fn beta_reduce(redex: NonNull<App>) {
  unsafe {
    let arg = (*redex.as_ptr()).arg;
    let lam = match (*redex.as_ptr()).fun {
      DAGPtr::Lam(lam) => lam,
      _ => unreachable!("β-redex without a lambda in function position"),
    };
    let var = (*lam.as_ptr()).var;
    let result = if (*var.as_ptr()).parents.is_none() {
      // the variable never occurs: the body is the contractum as-is
      (*lam.as_ptr()).bod
    }
    else {
      (*lam.as_ptr()).cache = Cache::Stop;
      // seed the upward walk: the rebuilt image of the variable is the
      // argument itself
      (*var.as_ptr()).cache = Cache::Copied(arg);
      for occurrence in Link::iter((*var.as_ptr()).parents) {
        upcopy(arg, *occurrence);
      }
      let result = match get_cache((*lam.as_ptr()).bod) {
        Cache::Copied(new_bod) => new_bod,
        _ => unreachable!("body spine was not copied"),
      };
      (*lam.as_ptr()).cache = Cache::Empty;
      clear_copies(var);
      result
    };
    for parent in Link::iter((*redex.as_ptr()).parents) {
      upreplace(result, *parent);
    }
  }
}

// Apply a primitive in function position. Returns false when the primitive
// declines the argument, leaving the application in place.
pub fn prim_reduce(redex: NonNull<App>) -> bool {
  unsafe {
    let arg = (*redex.as_ptr()).arg;
    let prim = match (*redex.as_ptr()).fun {
      DAGPtr::Prim(prim) => prim,
      _ => unreachable!("primitive application without a primitive"),
    };
    // the temporary head keeps the argument rooted while the primitive
    // reduces it
    let mut arg_head = DAG::new(arg);
    let res = (*prim.as_ptr()).val.apply(&mut arg_head);
    arg_head.free();
    match res {
      None => false,
      Some(val) => {
        let result = DAGPtr::Prim(alloc_prim(val, None));
        for parent in Link::iter((*redex.as_ptr()).parents) {
          upreplace(result, *parent);
        }
        true
      }
    }
  }
}

// One outermost-leftmost reduction step under `node`.
fn hnf_step_node(node: DAGPtr) -> bool {
  unsafe {
    match node {
      DAGPtr::Lam(link) => hnf_step_node((*link.as_ptr()).bod),
      DAGPtr::App(link) => {
        if hnf_step_node((*link.as_ptr()).fun) {
          return true;
        }
        match (*link.as_ptr()).fun {
          DAGPtr::Lam(_) => {
            beta_reduce(link);
            true
          }
          DAGPtr::Prim(_) => prim_reduce(link),
          _ => false,
        }
      }
      DAGPtr::Var(_) | DAGPtr::Prim(_) => false,
    }
  }
}

impl DAG {
  /// Perform one head reduction step. Returns whether progress was made.
  pub fn hnf_step(&mut self) -> bool {
    hnf_step_node(DAGPtr::Lam(self.root))
  }

  /// Reduce to head normal form. May not terminate.
  pub fn hnf(&mut self) {
    while self.hnf_step() {}
  }

  /// Reduce to β-normal form: head normal form first, then every argument
  /// position. May not terminate.
  pub fn norm(&mut self) {
    self.hnf();
    let mut trail = vec![self.body()];
    while let Some(node) = trail.pop() {
      match node {
        DAGPtr::App(link) => unsafe {
          let mut fun = DAG::new((*link.as_ptr()).fun);
          fun.hnf();
          trail.push(fun.body());
          fun.free();
          let mut arg = DAG::new((*link.as_ptr()).arg);
          arg.hnf();
          trail.push(arg.body());
          arg.free();
        },
        DAGPtr::Lam(link) => unsafe {
          let mut bod = DAG::new((*link.as_ptr()).bod);
          bod.hnf();
          trail.push(bod.body());
          bod.free();
        },
        _ => (),
      }
    }
  }
}
