//! In-memory shadow of the directory subtree the FTP server exposes. Nodes live in a flat
//! `Vec`, addressed by index rather than by pointer/`Rc`, so that a session's `cwd_node` handle
//! stays valid across mutations elsewhere in the tree (the classic "parent/sibling are array
//! indices, not raw pointers" trick for back-pointer graphs).
use std::collections::{HashMap, VecDeque};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{FtpError, FtpResult};

/// Index into `Tree::nodes`. Stable for the lifetime of the tree: removal detaches a node from
/// its parent's child chain rather than compacting the array, so outstanding `NodeId`s (a
/// session's `cwd_node`) never dangle or get silently repointed at an unrelated node.
pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct Node {
    pub parent: NodeId,
    pub first_child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    /// `Some` only for a symlink whose target resolves to an existing node inside the served
    /// root and doesn't form a cycle back through itself.
    pub link_target: Option<NodeId>,
    pub name: String,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub mtime: i64,
}

/// Depth = -1 means unlimited; 0 means root only.
pub const UNLIMITED_DEPTH: i64 = -1;

/// Result of `Tree::resolve`: the node for the last existing component (if it exists), the
/// parent of the final component, and the final component's own name.
#[derive(Debug)]
pub struct Resolved {
    pub node: Option<NodeId>,
    pub parent: NodeId,
    pub name: String,
}

#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
    root_path: PathBuf,
}

impl Tree {
    /// Resolves `path` to a real absolute path, then walks the filesystem breadth-first in two
    /// passes: pass 1 builds nodes for plain directories/files and records symlinks without
    /// descending into them; pass 2 wires the symlinks whose target lies inside the served root
    /// to the node already built for that path, breaking any cycle by leaving the link as a bare
    /// leaf. `depth = -1` means unlimited, `depth = 0` means root only.
    pub async fn open(path: &Path, depth: i64) -> FtpResult<Self> {
        let root_path = tokio::fs::canonicalize(path).await?;
        let root_meta = tokio::fs::metadata(&root_path).await?;
        if !root_meta.is_dir() {
            return Err(FtpError::Fatal(format!(
                "served root {} is not a directory",
                root_path.display()
            )));
        }

        let root_node = Node {
            parent: 0,
            first_child: None,
            next_sibling: None,
            link_target: None,
            name: "/".to_string(),
            is_dir: true,
            is_symlink: false,
            mode: root_meta.mode(),
            uid: root_meta.uid(),
            gid: root_meta.gid(),
            size: root_meta.len(),
            mtime: root_meta.mtime(),
        };

        let mut tree = Tree {
            nodes: vec![root_node],
            root: 0,
            root_path: root_path.clone(),
        };

        let mut by_path: HashMap<PathBuf, NodeId> = HashMap::new();
        by_path.insert(root_path.clone(), tree.root);

        let mut pending_symlinks: Vec<(NodeId, PathBuf)> = Vec::new();
        let mut queue: VecDeque<(NodeId, PathBuf, i64)> = VecDeque::new();
        queue.push_back((tree.root, root_path, 0));

        while let Some((node_id, real_path, level)) = queue.pop_front() {
            if depth != UNLIMITED_DEPTH && level >= depth {
                continue;
            }

            let mut entries = match tokio::fs::read_dir(&real_path).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                    debug!("read_dir denied for {}, keeping as empty dir", real_path.display());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let entry_path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                let symlink_meta = tokio::fs::symlink_metadata(&entry_path).await?;
                let is_symlink = symlink_meta.file_type().is_symlink();

                let (is_dir, meta) = if is_symlink {
                    (false, symlink_meta)
                } else {
                    let meta = tokio::fs::metadata(&entry_path).await?;
                    let is_dir = meta.is_dir();
                    (is_dir, meta)
                };

                let child_id = tree.nodes.len();
                tree.nodes.push(Node {
                    parent: node_id,
                    first_child: None,
                    next_sibling: None,
                    link_target: None,
                    name,
                    is_dir,
                    is_symlink,
                    mode: meta.mode(),
                    uid: meta.uid(),
                    gid: meta.gid(),
                    size: meta.len(),
                    mtime: meta.mtime(),
                });
                tree.append_child(node_id, child_id);

                if is_symlink {
                    // Don't descend yet: whether this wires to an in-tree node is decided once
                    // every plain directory has been scanned, in pass 2.
                    if let Ok(target) = tokio::fs::canonicalize(&entry_path).await {
                        pending_symlinks.push((child_id, target));
                    }
                } else {
                    by_path.insert(entry_path.clone(), child_id);
                    if is_dir {
                        queue.push_back((child_id, entry_path, level + 1));
                    }
                }
            }
        }

        for (link_id, target) in pending_symlinks {
            if !target.starts_with(&tree.root_path) {
                continue; // escapes the served root: stays a content-less leaf
            }
            if let Some(&target_id) = by_path.get(&target) {
                if tree.is_ancestor_or_self(target_id, link_id) {
                    warn!("symlink cycle detected through node {}, treating as a leaf", link_id);
                    continue;
                }
                tree.nodes[link_id].link_target = Some(target_id);
            }
        }

        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn parent(&self, id: NodeId) -> NodeId {
        self.nodes[id].parent
    }

    /// The node whose children a listing of `id` should actually show: itself, unless `id` is
    /// a symlink wired to an in-root target, in which case its target.
    pub fn effective(&self, id: NodeId) -> NodeId {
        self.nodes[id].link_target.unwrap_or(id)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut cur = self.nodes[self.effective(id)].first_child;
        while let Some(child) = cur {
            result.push(child);
            cur = self.nodes[child].next_sibling;
        }
        result
    }

    /// The client-visible path of `id`, e.g. `"/"` or `"/sub/dir"`.
    pub fn format_path(&self, id: NodeId) -> String {
        if id == self.root {
            return "/".to_string();
        }
        let segments = self.segments_to_root(id);
        format!("/{}", segments.join("/"))
    }

    /// The real on-disk path of `id`, under the served root.
    pub fn real_path(&self, id: NodeId) -> PathBuf {
        let mut path = self.root_path.clone();
        for segment in self.segments_to_root(id) {
            path.push(segment);
        }
        path
    }

    fn segments_to_root(&self, id: NodeId) -> Vec<String> {
        let mut segments = Vec::new();
        let mut cur = id;
        while cur != self.root {
            segments.push(self.nodes[cur].name.clone());
            cur = self.nodes[cur].parent;
        }
        segments.reverse();
        segments
    }

    /// Resolves a client-supplied path, absolute (leading `/`) or relative to `anchor`.
    /// `.` leaves the cursor in place; `..` moves to the parent and clamps at the root rather
    /// than erroring. A non-terminal segment that doesn't exist is `NotFound`; a missing final
    /// segment is returned as `node: None` so callers like MKD/STOR/RNTO can treat it as the
    /// not-yet-existing name they're about to create.
    pub fn resolve(&self, path: &str, anchor: NodeId) -> FtpResult<Resolved> {
        let mut cursor = if path.starts_with('/') { self.root } else { anchor };
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if segments.is_empty() {
            return Ok(Resolved {
                node: Some(cursor),
                parent: self.nodes[cursor].parent,
                name: self.nodes[cursor].name.clone(),
            });
        }

        let last = segments.len() - 1;
        for (i, segment) in segments.iter().enumerate() {
            match *segment {
                "." => continue,
                ".." => cursor = self.nodes[cursor].parent,
                name => {
                    let parent_effective = self.effective(cursor);
                    match self.find_child(parent_effective, name) {
                        Some(child) => cursor = child,
                        None if i == last => {
                            return Ok(Resolved {
                                node: None,
                                parent: parent_effective,
                                name: name.to_string(),
                            });
                        }
                        None => return Err(FtpError::NotFound(path.to_string())),
                    }
                }
            }
        }

        Ok(Resolved {
            node: Some(cursor),
            parent: self.nodes[cursor].parent,
            name: self.nodes[cursor].name.clone(),
        })
    }

    fn find_child(&self, parent_effective: NodeId, name: &str) -> Option<NodeId> {
        let mut cur = self.nodes[parent_effective].first_child;
        while let Some(id) = cur {
            if self.nodes[id].name == name {
                return Some(id);
            }
            cur = self.nodes[id].next_sibling;
        }
        None
    }

    fn last_child(&self, parent_effective: NodeId) -> Option<NodeId> {
        let mut cur = self.nodes[parent_effective].first_child;
        let mut last = None;
        while let Some(id) = cur {
            last = Some(id);
            cur = self.nodes[id].next_sibling;
        }
        last
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        match self.last_child(parent) {
            Some(last) => self.nodes[last].next_sibling = Some(child),
            None => self.nodes[parent].first_child = Some(child),
        }
    }

    /// True if `candidate` is `of` or one of `of`'s ancestors — used to reject a symlink whose
    /// target would make listing it recurse back into itself.
    fn is_ancestor_or_self(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut cur = of;
        loop {
            if cur == candidate {
                return true;
            }
            let parent = self.nodes[cur].parent;
            if parent == cur {
                return false;
            }
            cur = parent;
        }
    }

    /// `stat`s `parent/name` on disk and attaches a new child node for it.
    pub async fn insert_child(&mut self, parent: NodeId, name: &str) -> FtpResult<NodeId> {
        let parent = self.effective(parent);
        let mut path = self.real_path(parent);
        path.push(name);

        let symlink_meta = tokio::fs::symlink_metadata(&path).await?;
        let is_symlink = symlink_meta.file_type().is_symlink();
        let (is_dir, meta) = if is_symlink {
            (false, symlink_meta)
        } else {
            let meta = tokio::fs::metadata(&path).await?;
            let is_dir = meta.is_dir();
            (is_dir, meta)
        };

        let child_id = self.nodes.len();
        self.nodes.push(Node {
            parent,
            first_child: None,
            next_sibling: None,
            link_target: None,
            name: name.to_string(),
            is_dir,
            is_symlink,
            mode: meta.mode(),
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.len(),
            mtime: meta.mtime(),
        });
        self.append_child(parent, child_id);

        Ok(child_id)
    }

    /// Detaches `name` from `parent`'s child chain. The node (and any descendants it owned)
    /// becomes unreachable from the root but its slot isn't reclaimed from `nodes`: the array
    /// is append-only so that no other session's `NodeId` is ever invalidated by a removal
    /// elsewhere in the tree. Memory for dead subtrees is bounded by server-lifetime churn and
    /// is freed in bulk when the whole tree is dropped at shutdown.
    pub fn remove_child_by_name(&mut self, parent: NodeId, name: &str) {
        let parent = self.effective(parent);
        let mut prev: Option<NodeId> = None;
        let mut cur = self.nodes[parent].first_child;

        while let Some(id) = cur {
            if self.nodes[id].name == name {
                let next = self.nodes[id].next_sibling;
                match prev {
                    Some(p) => self.nodes[p].next_sibling = next,
                    None => self.nodes[parent].first_child = next,
                }
                self.nodes[id].next_sibling = None;
                return;
            }
            prev = Some(id);
            cur = self.nodes[id].next_sibling;
        }
    }

    /// True if `id` is still reachable from its recorded parent, i.e. hasn't been detached by a
    /// `remove_child_by_name`/`move_node` call since it was looked up. The root is always live.
    pub fn is_live(&self, id: NodeId) -> bool {
        if id == self.root {
            return true;
        }
        let parent = self.nodes[id].parent;
        self.find_child(self.effective(parent), &self.nodes[id].name) == Some(id)
    }

    /// Re-`stat`s the node's real path and updates its snapshot.
    pub async fn refresh(&mut self, id: NodeId) -> FtpResult<()> {
        let path = self.real_path(id);
        let meta = tokio::fs::symlink_metadata(&path).await?;
        let was_symlink = self.nodes[id].is_symlink;

        let node = &mut self.nodes[id];
        node.mode = meta.mode();
        node.uid = meta.uid();
        node.gid = meta.gid();
        node.size = meta.len();
        node.mtime = meta.mtime();
        if !was_symlink {
            node.is_dir = meta.is_dir();
        }
        Ok(())
    }

    /// Renames a node in place (same parent, new final segment).
    pub fn rename_node(&mut self, id: NodeId, new_name: &str) {
        self.nodes[id].name = new_name.to_string();
    }

    /// Detaches `id` from `old_parent`'s child chain and re-attaches it under `new_parent`
    /// with `new_name`, for an RNTO that also changes directory.
    pub fn move_node(&mut self, id: NodeId, old_parent: NodeId, new_parent: NodeId, new_name: &str) {
        let old_parent = self.effective(old_parent);
        let mut prev: Option<NodeId> = None;
        let mut cur = self.nodes[old_parent].first_child;
        while let Some(cur_id) = cur {
            if cur_id == id {
                let next = self.nodes[cur_id].next_sibling;
                match prev {
                    Some(p) => self.nodes[p].next_sibling = next,
                    None => self.nodes[old_parent].first_child = next,
                }
                break;
            }
            prev = Some(cur_id);
            cur = self.nodes[cur_id].next_sibling;
        }

        self.nodes[id].next_sibling = None;
        self.nodes[id].parent = new_parent;
        self.nodes[id].name = new_name.to_string();
        self.append_child(self.effective(new_parent), id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    async fn scan(dir: &Path) -> Tree {
        Tree::open(dir, UNLIMITED_DEPTH).await.unwrap()
    }

    #[tokio::test]
    async fn root_is_its_own_parent_when_addressed_by_cycle_check() {
        let dir = tempfile::tempdir().unwrap();
        let tree = scan(dir.path()).await;
        assert_eq!(tree.format_path(tree.root()), "/");
    }

    #[tokio::test]
    async fn resolve_clamps_dotdot_at_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let tree = scan(dir.path()).await;

        let resolved = tree.resolve("../..", tree.root()).unwrap();
        assert_eq!(resolved.node, Some(tree.root()));
        assert_eq!(tree.format_path(resolved.node.unwrap()), "/");
    }

    #[tokio::test]
    async fn resolve_finds_nested_child() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/hello"), b"hello").unwrap();
        let tree = scan(dir.path()).await;

        let resolved = tree.resolve("/sub/hello", tree.root()).unwrap();
        let node = resolved.node.unwrap();
        assert_eq!(tree.format_path(node), "/sub/hello");
        assert_eq!(tree.node(node).size, 5);
    }

    #[tokio::test]
    async fn resolve_terminal_absence_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let tree = scan(dir.path()).await;

        let resolved = tree.resolve("/newfile", tree.root()).unwrap();
        assert!(resolved.node.is_none());
        assert_eq!(resolved.name, "newfile");
        assert_eq!(resolved.parent, tree.root());
    }

    #[tokio::test]
    async fn resolve_nonterminal_absence_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let tree = scan(dir.path()).await;

        assert!(tree.resolve("/missing/child", tree.root()).is_err());
    }

    #[tokio::test]
    async fn in_root_symlink_exposes_target_children() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("real")).unwrap();
        std::fs::write(dir.path().join("real/file"), b"x").unwrap();
        symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        let tree = scan(dir.path()).await;
        let alias = tree.resolve("/alias", tree.root()).unwrap().node.unwrap();
        let children: Vec<_> = tree
            .children(alias)
            .into_iter()
            .map(|id| tree.node(id).name.clone())
            .collect();
        assert_eq!(children, vec!["file".to_string()]);
    }

    #[tokio::test]
    async fn off_root_symlink_is_a_leaf() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret"), b"nope").unwrap();

        let dir = tempfile::tempdir().unwrap();
        symlink(outside.path(), dir.path().join("escape")).unwrap();

        let tree = scan(dir.path()).await;
        let escape = tree.resolve("/escape", tree.root()).unwrap().node.unwrap();
        assert!(tree.children(escape).is_empty());
    }

    #[tokio::test]
    async fn symlink_cycle_through_ancestor_is_a_leaf() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        symlink(dir.path(), dir.path().join("sub/loop")).unwrap();

        let tree = scan(dir.path()).await;
        let sub = tree.resolve("/sub", tree.root()).unwrap().node.unwrap();
        let looped = tree.resolve("loop", sub).unwrap().node.unwrap();
        assert!(tree.node(looped).link_target.is_none());
    }

    #[tokio::test]
    async fn insert_remove_and_rename_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = scan(dir.path()).await;
        let root = tree.root();

        std::fs::write(dir.path().join("new.txt"), b"hi").unwrap();
        let id = tree.insert_child(root, "new.txt").await.unwrap();
        assert_eq!(tree.format_path(id), "/new.txt");

        tree.rename_node(id, "renamed.txt");
        assert_eq!(tree.format_path(id), "/renamed.txt");

        tree.remove_child_by_name(root, "renamed.txt");
        assert!(tree.resolve("/renamed.txt", root).unwrap().node.is_none());
    }
}
