// The up-copy pass of bottom-up β-reduction and its complementary clear
// pass. `upcopy` rebuilds only the spine between a variable occurrence and
// its binder, sharing everything else; `clear_copies` then installs the
// uplinks that `upcopy` deferred and resets every cache slot it touched.

use crate::{
  dag::*,
  link::*,
};

use std::ptr::NonNull;

// The core up-copy function. `new_child` is the rebuilt image of the child
// that `up` points at; ensure the parent named by `up` has a rebuilt image
// of its own in its cache, then continue upward through its uplinks.
pub fn upcopy(new_child: DAGPtr, up: ParentPtr) {
  unsafe {
    match up {
      ParentPtr::AppFun(link) => {
        let app = &mut *link.as_ptr();
        match app.cache {
          // The other slot already rebuilt this node and its ancestors:
          // update the copy in place and do not traverse.
          Cache::Copied(DAGPtr::App(new_app)) => {
            (*new_app.as_ptr()).fun = new_child;
          }
          Cache::Empty => {
            // Child uplinks of the copy are installed on the clear pass,
            // once the copy can no longer change through the other slot.
            let new_app = alloc_app(new_child, app.arg, None);
            app.cache = Cache::Copied(DAGPtr::App(new_app));
            for parent in Link::iter(app.parents) {
              upcopy(DAGPtr::App(new_app), *parent);
            }
          }
          _ => unreachable!("malformed application cache"),
        }
      }
      ParentPtr::AppArg(link) => {
        let app = &mut *link.as_ptr();
        match app.cache {
          Cache::Copied(DAGPtr::App(new_app)) => {
            (*new_app.as_ptr()).arg = new_child;
          }
          Cache::Empty => {
            let new_app = alloc_app(app.fun, new_child, None);
            app.cache = Cache::Copied(DAGPtr::App(new_app));
            for parent in Link::iter(app.parents) {
              upcopy(DAGPtr::App(new_app), *parent);
            }
          }
          _ => unreachable!("malformed application cache"),
        }
      }
      ParentPtr::LamBod(link) => {
        let lam = &mut *link.as_ptr();
        match lam.cache {
          // The binder of the variable under substitution: stop.
          Cache::Stop => (),
          Cache::Empty => {
            let old_var = lam.var;
            let Var { nam, dep, .. } = &*old_var.as_ptr();
            let new_var = alloc_var(nam.clone(), *dep, None);
            let new_lam = alloc_lam(new_var, new_child, None);
            lam.cache = Cache::Copied(DAGPtr::Lam(new_lam));
            // Seed the replacement variable through the remaining
            // occurrences of the old one before continuing upward.
            (*old_var.as_ptr()).cache = Cache::Copied(DAGPtr::Var(new_var));
            for occurrence in Link::iter((*old_var.as_ptr()).parents) {
              upcopy(DAGPtr::Var(new_var), *occurrence);
            }
            for parent in Link::iter(lam.parents) {
              upcopy(DAGPtr::Lam(new_lam), *parent);
            }
          }
          Cache::Copied(_) => unreachable!("binder copied twice"),
        }
      }
    }
  }
}

/// Walk upward from a substituted variable along the same uplinks `upcopy`
/// took, linking each copy's children back to it and resetting caches.
pub fn clear_copies(var: NonNull<Var>) {
  unsafe {
    (*var.as_ptr()).cache = Cache::Empty;
    for parent in Link::iter((*var.as_ptr()).parents) {
      clean_up(parent);
    }
  }
}

fn clean_up(up: &ParentPtr) {
  unsafe {
    match up {
      ParentPtr::AppFun(link) | ParentPtr::AppArg(link) => {
        let app = &mut *link.as_ptr();
        if let Cache::Copied(DAGPtr::App(new_app)) = app.cache {
          app.cache = Cache::Empty;
          let App { fun, arg, fun_ref, arg_ref, .. } = &mut *new_app.as_ptr();
          add_to_parents(*fun, NonNull::from(fun_ref));
          add_to_parents(*arg, NonNull::from(arg_ref));
          for grandparent in Link::iter(app.parents) {
            clean_up(grandparent);
          }
        }
      }
      ParentPtr::LamBod(link) => {
        let lam = &mut *link.as_ptr();
        match lam.cache {
          Cache::Copied(DAGPtr::Lam(new_lam)) => {
            lam.cache = Cache::Empty;
            let Lam { bod, bod_ref, .. } = &mut *new_lam.as_ptr();
            add_to_parents(*bod, NonNull::from(bod_ref));
            clear_copies(lam.var);
            for grandparent in Link::iter(lam.parents) {
              clean_up(grandparent);
            }
          }
          // Empty means this subgraph was already cleared or never copied;
          // Stop marks the binder of the redex, the top of the spine.
          _ => (),
        }
      }
    }
  }
}

// Redirect one parent edge to a replacement child. The edge's uplink record
// moves from the old child's parent list to the new child's; the old child
// is released if that was its last reference.
pub fn upreplace(new_child: DAGPtr, up: ParentPtr) {
  unsafe {
    match up {
      ParentPtr::AppFun(link) => {
        let App { fun, fun_ref, .. } = &mut *link.as_ptr();
        let old = *fun;
        let new_old_parents = fun_ref.detach();
        set_parents(old, new_old_parents);
        *fun = new_child;
        add_to_parents(new_child, NonNull::from(fun_ref));
        if new_old_parents.is_none() {
          free_dead_node(old);
        }
      }
      ParentPtr::AppArg(link) => {
        let App { arg, arg_ref, .. } = &mut *link.as_ptr();
        let old = *arg;
        let new_old_parents = arg_ref.detach();
        set_parents(old, new_old_parents);
        *arg = new_child;
        add_to_parents(new_child, NonNull::from(arg_ref));
        if new_old_parents.is_none() {
          free_dead_node(old);
        }
      }
      ParentPtr::LamBod(link) => {
        let Lam { bod, bod_ref, .. } = &mut *link.as_ptr();
        let old = *bod;
        let new_old_parents = bod_ref.detach();
        set_parents(old, new_old_parents);
        *bod = new_child;
        add_to_parents(new_child, NonNull::from(bod_ref));
        if new_old_parents.is_none() {
          free_dead_node(old);
        }
      }
    }
  }
}
