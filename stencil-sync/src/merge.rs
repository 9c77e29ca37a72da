//! Merging the template branch tip into the consumer's branch.

use std::path::PathBuf;

use git2::build::CheckoutBuilder;
use git2::{BranchType, Oid, Reference, Repository, Signature};

use crate::error::SyncError;

/// Branch that receives the template merge.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MergeTarget {
    /// Whatever HEAD currently points at.
    #[default]
    Head,
    /// A named local branch, created from HEAD if missing.
    Branch(String),
}

impl MergeTarget {
    pub fn from_option(name: Option<&str>) -> Self {
        name.map_or(Self::Head, |n| Self::Branch(n.to_string()))
    }
}

/// Result of [`merge_branch_into`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Target already contained the template commit.
    UpToDate,
    /// A merge commit with the target and the template as parents.
    Merged { commit: Oid },
}

/// Merge `template` into `target` with a two-parent commit.
///
/// Unrelated histories are allowed. On conflicts the repository is left in
/// git's merge state and [`SyncError::MergeConflict`] is returned.
pub fn merge_branch_into(
    repo: &Repository,
    template: Oid,
    target: &MergeTarget,
    message: &str,
    sig: &Signature<'_>,
) -> Result<MergeOutcome, SyncError> {
    let target_ref = switch_to(repo, target)?;
    let target_name = target_ref.shorthand().unwrap_or("HEAD").to_string();
    let annotated = repo.find_annotated_commit(template)?;

    let (analysis, _) = repo.merge_analysis_for_ref(&target_ref, &[&annotated])?;
    if analysis.is_up_to_date() {
        tracing::info!(target = %target_name, template = %template, "target already up to date");
        return Ok(MergeOutcome::UpToDate);
    }
    if !(analysis.is_normal() || analysis.is_fast_forward()) {
        return Err(SyncError::UnsupportedMergeAnalysis(format!("{analysis:?}")));
    }

    let mut checkout = CheckoutBuilder::new();
    checkout.safe().allow_conflicts(true).conflict_style_merge(true);
    repo.merge(&[&annotated], None, Some(&mut checkout))?;

    let mut index = repo.index()?;
    if index.has_conflicts() {
        let conflicts = conflicted_paths(&index)?;
        tracing::warn!(
            target = %target_name,
            count = conflicts.len(),
            "template merge has conflicts"
        );
        return Err(SyncError::MergeConflict {
            template,
            target: target_name,
            conflicts,
        });
    }

    let tree = repo.find_tree(index.write_tree()?)?;
    let ours = repo.head()?.peel_to_commit()?;
    let theirs = repo.find_commit(template)?;
    let commit = repo.commit(Some("HEAD"), sig, sig, message, &tree, &[&ours, &theirs])?;
    repo.cleanup_state()?;

    let mut checkout = CheckoutBuilder::new();
    checkout.safe();
    repo.checkout_head(Some(&mut checkout))?;
    tracing::info!(target = %target_name, commit = %commit, "merged template");
    Ok(MergeOutcome::Merged { commit })
}

/// Check out the merge target, creating the branch from HEAD if needed.
fn switch_to<'r>(repo: &'r Repository, target: &MergeTarget) -> Result<Reference<'r>, SyncError> {
    let name = match target {
        MergeTarget::Head => return Ok(repo.head()?),
        MergeTarget::Branch(name) => name,
    };
    let branch = match repo.find_branch(name, BranchType::Local) {
        Ok(branch) => branch,
        Err(e) if e.code() == git2::ErrorCode::NotFound => {
            let head = repo.head()?.peel_to_commit()?;
            tracing::info!(branch = %name, from = %head.id(), "creating merge target branch");
            repo.branch(name, &head, false)?
        }
        Err(e) => return Err(e.into()),
    };
    let reference = branch.into_reference();
    let refname = reference
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("refs/heads/{name}"));

    let current = repo.head().ok().and_then(|h| h.name().map(str::to_string));
    let already_there = current.as_deref() == Some(refname.as_str());
    if !already_there {
        let commit = reference.peel_to_commit()?;
        let mut checkout = CheckoutBuilder::new();
        checkout.safe();
        repo.checkout_tree(commit.as_object(), Some(&mut checkout))?;
        repo.set_head(&refname)?;
    }
    Ok(repo.find_reference(&refname)?)
}

fn conflicted_paths(index: &git2::Index) -> Result<Vec<PathBuf>, SyncError> {
    let mut paths = Vec::new();
    for conflict in index.conflicts()? {
        let conflict = conflict?;
        if let Some(entry) = conflict.our.or(conflict.their).or(conflict.ancestor) {
            paths.push(PathBuf::from(String::from_utf8_lossy(&entry.path).into_owned()));
        }
    }
    Ok(paths)
}
