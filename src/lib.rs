#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;
#[cfg(test)]
extern crate rand;

pub mod dag;
pub mod eval;
pub mod link;
pub mod prim;
pub mod term;
pub mod upcopy;

#[cfg(test)]
pub mod tests {
  use crate::{
    dag::*,
    link::Link,
  };
  use quickcheck::Gen;
  use rand::Rng;
  use std::{
    collections::BTreeSet,
    ptr::NonNull,
  };

  pub fn frequency<T, F: Fn(&mut Gen) -> T>(
    g: &mut Gen,
    gens: Vec<(i64, F)>,
  ) -> T {
    if gens.iter().any(|(v, _)| *v < 0) {
      panic!("Negative weight");
    }
    let sum: i64 = gens.iter().map(|x| x.0).sum();
    let mut rng = rand::thread_rng();
    let mut weight: i64 = rng.gen_range(1..=sum);
    for gen in gens {
      if weight - gen.0 <= 0 {
        return gen.1(g);
      }
      else {
        weight -= gen.0;
      }
    }
    panic!("Calculation error for weight = {}", weight);
  }

  fn addr(node: DAGPtr) -> usize {
    match node {
      DAGPtr::Var(link) => link.as_ptr() as usize,
      DAGPtr::Lam(link) => link.as_ptr() as usize,
      DAGPtr::App(link) => link.as_ptr() as usize,
      DAGPtr::Prim(link) => link.as_ptr() as usize,
    }
  }

  // Depth-first over owning edges, failing on a cycle.
  fn visit(
    node: DAGPtr,
    path: &mut BTreeSet<usize>,
    seen: &mut BTreeSet<usize>,
    nodes: &mut Vec<DAGPtr>,
  ) -> Result<(), String> {
    let key = addr(node);
    if path.contains(&key) {
      return Err(format!("owning-edge cycle through p{}", key));
    }
    if !seen.insert(key) {
      return Ok(());
    }
    path.insert(key);
    unsafe {
      match node {
        DAGPtr::Lam(link) => {
          visit((*link.as_ptr()).bod, path, seen, nodes)?;
        }
        DAGPtr::App(link) => {
          visit((*link.as_ptr()).fun, path, seen, nodes)?;
          visit((*link.as_ptr()).arg, path, seen, nodes)?;
        }
        _ => (),
      }
    }
    path.remove(&key);
    nodes.push(node);
    Ok(())
  }

  fn collect(node: DAGPtr, seen: &mut BTreeSet<usize>) {
    if !seen.insert(addr(node)) {
      return;
    }
    unsafe {
      match node {
        DAGPtr::Lam(link) => collect((*link.as_ptr()).bod, seen),
        DAGPtr::App(link) => {
          collect((*link.as_ptr()).fun, seen);
          collect((*link.as_ptr()).arg, seen);
        }
        _ => (),
      }
    }
  }

  // Every uplink on `node`'s list must be the record embedded in a parent
  // whose slot points back at `node`.
  fn check_uplinks(node: DAGPtr) -> Result<(), String> {
    unsafe {
      let mut iter = Link::iter(get_parents(node));
      while let Some(parent) = iter.next() {
        let record = iter.cursor().unwrap();
        match *parent {
          ParentPtr::LamBod(p) => {
            if (*p.as_ptr()).bod != node {
              return Err(format!("stale LamBod uplink on p{}", addr(node)));
            }
            if record != NonNull::from(&mut (*p.as_ptr()).bod_ref) {
              return Err(format!("foreign LamBod record on p{}", addr(node)));
            }
          }
          ParentPtr::AppFun(p) => {
            if (*p.as_ptr()).fun != node {
              return Err(format!("stale AppFun uplink on p{}", addr(node)));
            }
            if record != NonNull::from(&mut (*p.as_ptr()).fun_ref) {
              return Err(format!("foreign AppFun record on p{}", addr(node)));
            }
          }
          ParentPtr::AppArg(p) => {
            if (*p.as_ptr()).arg != node {
              return Err(format!("stale AppArg uplink on p{}", addr(node)));
            }
            if record != NonNull::from(&mut (*p.as_ptr()).arg_ref) {
              return Err(format!("foreign AppArg record on p{}", addr(node)));
            }
          }
        }
      }
    }
    Ok(())
  }

  // The embedded record for an edge must be linked into the child's list.
  fn check_linked(
    child: DAGPtr,
    record: NonNull<Parents>,
  ) -> Result<(), String> {
    let mut iter = Link::iter(get_parents(child));
    while iter.next().is_some() {
      if iter.cursor() == Some(record) {
        return Ok(());
      }
    }
    Err(format!("edge to p{} has no uplink", addr(child)))
  }

  /// Checks the global invariants of a graph: edge↔uplink bijection, empty
  /// caches, acyclicity over owning edges, and binder scoping.
  pub fn check_dag(dag: &DAG) -> Result<(), String> {
    let mut nodes = Vec::new();
    visit(
      DAGPtr::Lam(dag.root),
      &mut BTreeSet::new(),
      &mut BTreeSet::new(),
      &mut nodes,
    )?;
    for node in &nodes {
      if get_cache(*node) != Cache::Empty {
        return Err(format!("dirty cache on p{}", addr(*node)));
      }
      check_uplinks(*node)?;
      unsafe {
        match *node {
          DAGPtr::Lam(link) => {
            let Lam { var, bod, bod_ref, .. } = &mut *link.as_ptr();
            check_linked(*bod, NonNull::from(bod_ref))?;
            if (*var.as_ptr()).cache != Cache::Empty {
              return Err(format!("dirty cache on variable of p{}",
                link.as_ptr() as usize));
            }
            check_uplinks(DAGPtr::Var(*var))?;
            // all occurrences of the bound variable live inside the body
            let mut scope = BTreeSet::new();
            collect(*bod, &mut scope);
            for occurrence in Link::iter((*var.as_ptr()).parents) {
              let parent = match *occurrence {
                ParentPtr::LamBod(p) => DAGPtr::Lam(p),
                ParentPtr::AppFun(p) | ParentPtr::AppArg(p) => DAGPtr::App(p),
              };
              if !scope.contains(&addr(parent)) {
                return Err(format!(
                  "variable of p{} occurs outside its binder",
                  link.as_ptr() as usize
                ));
              }
            }
          }
          DAGPtr::App(link) => {
            let App { fun, arg, fun_ref, arg_ref, .. } = &mut *link.as_ptr();
            check_linked(*fun, NonNull::from(fun_ref))?;
            check_linked(*arg, NonNull::from(arg_ref))?;
          }
          _ => (),
        }
      }
    }
    Ok(())
  }
}
