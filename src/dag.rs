// Bottom-up reduction of lambda DAGs. Based on the paper by Olin Shivers and
// Mitchel Wand "Bottom-up β-reduction: uplinks and λ-DAGs"
// (https://www.brics.dk/RS/04/38/BRICS-RS-04-38.pdf)

use crate::{
  link::*,
  prim::Primitive,
  term::{
    Name,
    Term,
  },
};

use std::{
  cell::Cell,
  collections::{
    BTreeMap,
    BTreeSet,
  },
  fmt,
  io,
  ptr::NonNull,
};

/// A handle on a λ-DAG. The root is a dummy binder `λ_. body` whose variable
/// never occurs: it takes no part in reduction and exists only to hold one
/// uplink on `body`, so the expression has a stable single owner. Handles
/// must be released with [`DAG::free`].
pub struct DAG {
  pub root: NonNull<Lam>,
}

// A top-down λ-DAG pointer. Keeps track of what kind of node it points to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DAGPtr {
  Var(NonNull<Var>),
  Lam(NonNull<Lam>),
  App(NonNull<App>),
  Prim(NonNull<Prim>),
}

// A node's parent list: one intrusive link per parent edge
pub type Parents = Link<ParentPtr>;

// A bottom-up (parent) λ-DAG pointer. Keeps track of the relation between
// the child and the parent.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParentPtr {
  LamBod(NonNull<Lam>),
  AppFun(NonNull<App>),
  AppArg(NonNull<App>),
}

/// The transient scratch slot of a node. `Empty` outside of an active
/// β-reduction; during one, the binder of the redex holds `Stop` and every
/// node on the rebuilt spine holds `Copied` with its fresh copy.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Cache {
  Empty,
  Stop,
  Copied(DAGPtr),
}

// The λ-DAG nodes
#[repr(C)]
pub struct Var {
  pub nam: Name,
  // Only used for the readback of free variables.
  pub dep: u64,
  pub cache: Cache,
  pub parents: Option<NonNull<Parents>>,
}

#[repr(C)]
pub struct Lam {
  // Non-owning back-reference to the bound variable. There is no uplink for
  // this edge; the variable's uplinks are exactly its occurrences in `bod`.
  pub var: NonNull<Var>,
  pub bod: DAGPtr,
  pub bod_ref: Parents,
  pub cache: Cache,
  pub parents: Option<NonNull<Parents>>,
}

#[repr(C)]
pub struct App {
  pub fun: DAGPtr,
  pub arg: DAGPtr,
  pub fun_ref: Parents,
  pub arg_ref: Parents,
  pub cache: Cache,
  pub parents: Option<NonNull<Parents>>,
}

#[repr(C)]
pub struct Prim {
  pub val: Box<dyn Primitive>,
  pub cache: Cache,
  pub parents: Option<NonNull<Parents>>,
}

// The engine is single-threaded, so allocation accounting is per thread.
thread_local! {
  static LIVE_NODES: Cell<usize> = Cell::new(0);
}

/// Number of graph nodes currently allocated on this thread.
pub fn live_node_count() -> usize { LIVE_NODES.with(|c| c.get()) }

// Auxiliary allocation functions
#[inline]
pub fn alloc_val<T>(val: T) -> NonNull<T> {
  LIVE_NODES.with(|c| c.set(c.get() + 1));
  NonNull::from(Box::leak(Box::new(val)))
}

#[inline]
fn free_val<T: ?Sized>(ptr: NonNull<T>) {
  LIVE_NODES.with(|c| c.set(c.get() - 1));
  unsafe {
    drop(Box::from_raw(ptr.as_ptr()));
  }
}

#[inline]
pub fn alloc_var(
  nam: Name,
  dep: u64,
  parents: Option<NonNull<Parents>>,
) -> NonNull<Var> {
  alloc_val(Var { nam, dep, cache: Cache::Empty, parents })
}

/// Allocate a lambda node over `bod`. The embedded `bod_ref` uplink record
/// is initialized but not yet linked into `bod`'s parent list; the caller
/// either links it with `add_to_parents` or, during `upcopy`, leaves that
/// for the clear pass.
#[inline]
pub fn alloc_lam(
  var: NonNull<Var>,
  bod: DAGPtr,
  parents: Option<NonNull<Parents>>,
) -> NonNull<Lam> {
  unsafe {
    let lam = alloc_val(Lam {
      var,
      bod,
      bod_ref: Link::new(ParentPtr::LamBod(NonNull::dangling())),
      cache: Cache::Empty,
      parents,
    });
    (*lam.as_ptr()).bod_ref.elem = ParentPtr::LamBod(lam);
    lam
  }
}

/// Allocate an application node. Like `alloc_lam`, the embedded `fun_ref`
/// and `arg_ref` records are not linked into the children's parent lists.
#[inline]
pub fn alloc_app(
  fun: DAGPtr,
  arg: DAGPtr,
  parents: Option<NonNull<Parents>>,
) -> NonNull<App> {
  unsafe {
    let app = alloc_val(App {
      fun,
      arg,
      fun_ref: Link::new(ParentPtr::AppFun(NonNull::dangling())),
      arg_ref: Link::new(ParentPtr::AppArg(NonNull::dangling())),
      cache: Cache::Empty,
      parents,
    });
    (*app.as_ptr()).fun_ref.elem = ParentPtr::AppFun(app);
    (*app.as_ptr()).arg_ref.elem = ParentPtr::AppArg(app);
    app
  }
}

#[inline]
pub fn alloc_prim(
  val: Box<dyn Primitive>,
  parents: Option<NonNull<Parents>>,
) -> NonNull<Prim> {
  alloc_val(Prim { val, cache: Cache::Empty, parents })
}

// Auxiliary parent functions
#[inline]
pub fn get_parents(term: DAGPtr) -> Option<NonNull<Parents>> {
  unsafe {
    match term {
      DAGPtr::Var(link) => (*link.as_ptr()).parents,
      DAGPtr::Lam(link) => (*link.as_ptr()).parents,
      DAGPtr::App(link) => (*link.as_ptr()).parents,
      DAGPtr::Prim(link) => (*link.as_ptr()).parents,
    }
  }
}

#[inline]
pub fn set_parents(term: DAGPtr, pref: Option<NonNull<Parents>>) {
  unsafe {
    match term {
      DAGPtr::Var(link) => (*link.as_ptr()).parents = pref,
      DAGPtr::Lam(link) => (*link.as_ptr()).parents = pref,
      DAGPtr::App(link) => (*link.as_ptr()).parents = pref,
      DAGPtr::Prim(link) => (*link.as_ptr()).parents = pref,
    }
  }
}

#[inline]
pub fn get_cache(term: DAGPtr) -> Cache {
  unsafe {
    match term {
      DAGPtr::Var(link) => (*link.as_ptr()).cache,
      DAGPtr::Lam(link) => (*link.as_ptr()).cache,
      DAGPtr::App(link) => (*link.as_ptr()).cache,
      DAGPtr::Prim(link) => (*link.as_ptr()).cache,
    }
  }
}

#[inline]
pub fn add_to_parents(node: DAGPtr, plink: NonNull<Parents>) {
  let parents = get_parents(node);
  match parents {
    Some(parents) => unsafe { (*parents.as_ptr()).attach(plink) },
    None => set_parents(node, Some(plink)),
  }
}

/// Build a lambda over an already-built body, linking the body uplink.
pub fn new_lam(var: NonNull<Var>, bod: DAGPtr) -> NonNull<Lam> {
  let lam = alloc_lam(var, bod, None);
  unsafe {
    add_to_parents(bod, NonNull::from(&mut (*lam.as_ptr()).bod_ref));
  }
  lam
}

/// Build an application over already-built children, linking both uplinks.
pub fn new_app(fun: DAGPtr, arg: DAGPtr) -> NonNull<App> {
  let app = alloc_app(fun, arg, None);
  unsafe {
    add_to_parents(fun, NonNull::from(&mut (*app.as_ptr()).fun_ref));
    add_to_parents(arg, NonNull::from(&mut (*app.as_ptr()).arg_ref));
  }
  app
}

/// Wrap an opaque primitive value as an atomic node.
pub fn new_prim(val: Box<dyn Primitive>) -> NonNull<Prim> {
  alloc_prim(val, None)
}

// Free parentless nodes.
pub fn free_dead_node(node: DAGPtr) {
  unsafe {
    match node {
      DAGPtr::Lam(link) => {
        let Lam { var, bod, bod_ref, .. } = &mut *link.as_ptr();
        // A variable with no occurrences is reachable from nowhere else and
        // dies with its binder. One with occurrences dies when the cascade
        // through `bod` removes the last of them.
        if (*var.as_ptr()).parents.is_none() {
          free_val(*var);
        }
        let new_bod_parents = bod_ref.detach();
        set_parents(*bod, new_bod_parents);
        if new_bod_parents.is_none() {
          free_dead_node(*bod);
        }
        free_val(link);
      }
      DAGPtr::App(link) => {
        let App { fun, arg, fun_ref, arg_ref, .. } = &mut *link.as_ptr();
        let new_fun_parents = fun_ref.detach();
        set_parents(*fun, new_fun_parents);
        if new_fun_parents.is_none() {
          free_dead_node(*fun);
        }
        let new_arg_parents = arg_ref.detach();
        set_parents(*arg, new_arg_parents);
        if new_arg_parents.is_none() {
          free_dead_node(*arg);
        }
        free_val(link);
      }
      DAGPtr::Var(link) => {
        free_val(link);
      }
      DAGPtr::Prim(link) => {
        // dropping the node drops the boxed primitive with it
        free_val(link);
      }
    }
  }
}

#[inline]
fn dag_ptr_addr(node: DAGPtr) -> usize {
  match node {
    DAGPtr::Var(link) => link.as_ptr() as usize,
    DAGPtr::Lam(link) => link.as_ptr() as usize,
    DAGPtr::App(link) => link.as_ptr() as usize,
    DAGPtr::Prim(link) => link.as_ptr() as usize,
  }
}

#[inline]
fn parent_ptr_addr(parent: ParentPtr) -> usize {
  match parent {
    ParentPtr::LamBod(link) => link.as_ptr() as usize,
    ParentPtr::AppFun(link) => link.as_ptr() as usize,
    ParentPtr::AppArg(link) => link.as_ptr() as usize,
  }
}

impl DAG {
  /// Wrap an expression under a dummy binder so it has a stable root.
  pub fn new(bod: DAGPtr) -> DAG {
    let var = alloc_var(Name::from("_"), 0, None);
    let root = alloc_lam(var, bod, None);
    unsafe {
      add_to_parents(bod, NonNull::from(&mut (*root.as_ptr()).bod_ref));
    }
    DAG { root }
  }

  #[inline]
  pub fn body(&self) -> DAGPtr {
    unsafe { (*self.root.as_ptr()).bod }
  }

  /// Drop this handle. Everything that was reachable only through it is
  /// released.
  pub fn free(self) {
    free_dead_node(DAGPtr::Lam(self.root))
  }

  /// If the expression under this handle is a primitive atom, borrow it.
  pub fn get_prim(&self) -> Option<&dyn Primitive> {
    match self.body() {
      DAGPtr::Prim(link) => unsafe { Some(&*(*link.as_ptr()).val) },
      _ => None,
    }
  }

  pub fn from_term(tree: &Term) -> Self {
    let var = alloc_var(Name::from("_"), 0, None);
    let root = alloc_lam(var, DAGPtr::Var(var), None);
    let bod_ref =
      unsafe { NonNull::from(&mut (*root.as_ptr()).bod_ref) };
    let bod = DAG::from_term_inner(tree, 0, BTreeMap::new(), Some(bod_ref));
    unsafe {
      (*root.as_ptr()).bod = bod;
    }
    DAG { root }
  }

  pub fn from_term_inner(
    tree: &Term,
    depth: u64,
    mut ctx: BTreeMap<u64, DAGPtr>,
    parents: Option<NonNull<Parents>>,
  ) -> DAGPtr {
    match tree {
      Term::Var(nam, idx) => {
        if *idx < depth {
          let dep = depth - 1 - idx;
          match ctx.get(&dep) {
            Some(val) => {
              if let Some(parents) = parents {
                Link::append(parents, get_parents(*val));
                set_parents(*val, Some(parents));
              }
              *val
            }
            None => panic!("malformed term: unbound variable {}", nam),
          }
        }
        else {
          // free variable; one node per occurrence
          DAGPtr::Var(alloc_var(nam.clone(), idx - depth, parents))
        }
      }
      Term::Lam(nam, bod) => unsafe {
        let var = alloc_var(nam.clone(), 0, None);
        // the body slot starts out pointing at the variable and is
        // overwritten once the real body exists
        let lam = alloc_lam(var, DAGPtr::Var(var), parents);
        let bod_ref = NonNull::from(&mut (*lam.as_ptr()).bod_ref);
        ctx.insert(depth, DAGPtr::Var(var));
        let bod = DAG::from_term_inner(bod, depth + 1, ctx, Some(bod_ref));
        (*lam.as_ptr()).bod = bod;
        DAGPtr::Lam(lam)
      },
      Term::App(fun_arg) => unsafe {
        let (fun, arg) = &**fun_arg;
        let fun = DAG::from_term_inner(fun, depth, ctx.clone(), None);
        let arg = DAG::from_term_inner(arg, depth, ctx, None);
        let app = alloc_app(fun, arg, parents);
        add_to_parents(fun, NonNull::from(&mut (*app.as_ptr()).fun_ref));
        add_to_parents(arg, NonNull::from(&mut (*app.as_ptr()).arg_ref));
        DAGPtr::App(app)
      },
      Term::Opr(sym) => {
        panic!("cannot rebuild an opaque primitive from its symbol {}", sym)
      }
    }
  }

  pub fn dag_ptr_to_term(
    node: &DAGPtr,
    map: &mut BTreeMap<*mut Var, u64>,
    depth: u64,
  ) -> Term {
    match node {
      DAGPtr::Var(link) => {
        let Var { nam, dep, .. } = unsafe { link.as_ref() };
        if let Some(level) = map.get(&link.as_ptr()) {
          Term::Var(nam.clone(), depth - level - 1)
        }
        else {
          Term::Var(nam.clone(), *dep)
        }
      }
      DAGPtr::Lam(link) => {
        let Lam { var, bod, .. } = unsafe { &mut *link.as_ptr() };
        let nam = unsafe { (*var.as_ptr()).nam.clone() };
        map.insert(var.as_ptr(), depth);
        let body = DAG::dag_ptr_to_term(bod, map, depth + 1);
        Term::Lam(nam, Box::new(body))
      }
      DAGPtr::App(link) => {
        let App { fun, arg, .. } = unsafe { link.as_ref() };
        let fun_map = &mut map.clone();
        Term::App(Box::new((
          DAG::dag_ptr_to_term(fun, fun_map, depth),
          DAG::dag_ptr_to_term(arg, map, depth),
        )))
      }
      DAGPtr::Prim(link) => {
        let Prim { val, .. } = unsafe { link.as_ref() };
        Term::Opr(val.symbol())
      }
    }
  }

  pub fn to_term(&self) -> Term {
    let mut map = BTreeMap::new();
    DAG::dag_ptr_to_term(&self.body(), &mut map, 0)
  }

  /// Dump the graph in GraphViz format. Red edges are uplinks, the blue
  /// edge is a binder's back-reference to its variable.
  pub fn dotify<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
    fn go(
      node: DAGPtr,
      out: &mut dyn io::Write,
      seen: &mut BTreeSet<usize>,
    ) -> io::Result<()> {
      let key = dag_ptr_addr(node);
      if !seen.insert(key) {
        return Ok(());
      }
      unsafe {
        match node {
          DAGPtr::Var(link) => {
            writeln!(out, "p{} [label=\"{}\"];", key, (*link.as_ptr()).nam)?;
          }
          DAGPtr::Lam(link) => {
            let Lam { var, bod, .. } = link.as_ref();
            writeln!(out, "p{} [label=\"\\\\{}\"];", key, (*var.as_ptr()).nam)?;
            writeln!(out, "p{} -> p{};", key, dag_ptr_addr(*bod))?;
            if (*var.as_ptr()).parents.is_some() {
              writeln!(
                out,
                "p{} -> p{} [color=blue];",
                key,
                var.as_ptr() as usize
              )?;
            }
            go(*bod, out, seen)?;
          }
          DAGPtr::App(link) => {
            let App { fun, arg, .. } = link.as_ref();
            writeln!(out, "p{} [label=\"*\"];", key)?;
            writeln!(
              out,
              "p{} -> p{} [color=\"#007f00\",label=\"fv\"];",
              key,
              dag_ptr_addr(*fun)
            )?;
            writeln!(out, "p{} -> p{} [label=\"av\"];", key, dag_ptr_addr(*arg))?;
            go(*fun, out, seen)?;
            go(*arg, out, seen)?;
          }
          DAGPtr::Prim(link) => {
            let Prim { val, .. } = link.as_ref();
            writeln!(out, "p{} [label=\"{}\"];", key, val.symbol())?;
          }
        }
        for parent in Link::iter(get_parents(node)) {
          writeln!(
            out,
            "p{} -> p{} [color=red];",
            key,
            parent_ptr_addr(*parent)
          )?;
        }
      }
      Ok(())
    }
    let mut seen = BTreeSet::new();
    let root_key = self.root.as_ptr() as usize;
    writeln!(out, "digraph Lambda {{")?;
    writeln!(out, "p{} [label=\"HEAD\"];", root_key)?;
    writeln!(out, "p{} -> p{};", root_key, dag_ptr_addr(self.body()))?;
    seen.insert(root_key);
    go(self.body(), out, &mut seen)?;
    writeln!(out, "}}")
  }
}

impl Clone for DAG {
  /// A new handle over the same body, holding one more uplink on it.
  fn clone(&self) -> Self {
    DAG::new(self.body())
  }
}

impl fmt::Debug for DAG {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    #[inline]
    fn format_uplink(p: ParentPtr) -> String {
      match p {
        ParentPtr::LamBod(link) => format!("LamBod<{:?}>", link.as_ptr()),
        ParentPtr::AppFun(link) => format!("AppFun<{:?}>", link.as_ptr()),
        ParentPtr::AppArg(link) => format!("AppArg<{:?}>", link.as_ptr()),
      }
    }
    #[inline]
    fn format_parents(list: Option<NonNull<Parents>>) -> String {
      let mut iter = Link::iter(list);
      match iter.next() {
        None => String::from("[]"),
        Some(head) => {
          let mut msg = String::from("[ ") + &format_uplink(*head);
          for val in iter {
            msg = msg + " <-> " + &format_uplink(*val);
          }
          msg + " ]"
        }
      }
    }
    fn go(term: DAGPtr, set: &mut BTreeSet<usize>) -> String {
      match term {
        DAGPtr::Var(link) => {
          let Var { nam, parents, .. } = unsafe { link.as_ref() };
          if set.insert(link.as_ptr() as usize) {
            format!(
              "\nVar<{:?}> {} parents: {}",
              link.as_ptr(),
              nam,
              format_parents(*parents)
            )
          }
          else {
            format!("\nSHARE<{:?}>", link.as_ptr())
          }
        }
        DAGPtr::Lam(link) => {
          if set.insert(link.as_ptr() as usize) {
            let Lam { var, parents, bod, .. } = unsafe { link.as_ref() };
            let nam = unsafe { (*var.as_ptr()).nam.clone() };
            format!(
              "\nLam<{:?}> {} parents: {}{}",
              link.as_ptr(),
              nam,
              format_parents(*parents),
              go(*bod, set)
            )
          }
          else {
            format!("\nSHARE<{:?}>", link.as_ptr())
          }
        }
        DAGPtr::App(link) => {
          if set.insert(link.as_ptr() as usize) {
            let App { fun, arg, parents, cache, .. } =
              unsafe { link.as_ref() };
            format!(
              "\nApp<{:?}> parents: {} cache: {:?}{}{}",
              link.as_ptr(),
              format_parents(*parents),
              cache,
              go(*fun, set),
              go(*arg, set)
            )
          }
          else {
            format!("\nSHARE<{:?}>", link.as_ptr())
          }
        }
        DAGPtr::Prim(link) => {
          let Prim { val, parents, .. } = unsafe { link.as_ref() };
          format!(
            "\nPrim<{:?}> {} parents: {}",
            link.as_ptr(),
            val.symbol(),
            format_parents(*parents)
          )
        }
      }
    }
    write!(f, "{}", go(self.body(), &mut BTreeSet::new()))
  }
}

impl fmt::Display for DAG {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.to_term())
  }
}
