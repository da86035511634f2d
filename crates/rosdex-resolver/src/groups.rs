use indexmap::IndexMap;
use tracing::trace;

use rosdex_cache::CacheEntry;
use rosdex_manifest::{GroupName, PackageName};

/// Collect the members of every group, in cache order.
pub(crate) fn group_members(
    packages: &IndexMap<PackageName, CacheEntry>,
) -> IndexMap<GroupName, Vec<PackageName>> {
    let mut members: IndexMap<GroupName, Vec<PackageName>> = IndexMap::new();
    for (name, entry) in packages {
        let Some(resolved) = entry.as_resolved() else {
            continue;
        };
        for group in &resolved.member_of_groups {
            members.entry(group.clone()).or_default().push(name.clone());
        }
    }
    members
}

/// Turn every `group_depend` into direct dependencies on the members of that group.
///
/// Runs once over the whole cache: a package never depends on itself through a group, and
/// dependencies gained from a group are not expanded any further.
pub(crate) fn expand_group_dependencies(packages: &mut IndexMap<PackageName, CacheEntry>) {
    let members = group_members(packages);

    for (name, entry) in packages.iter_mut() {
        let CacheEntry::Resolved(resolved) = entry else {
            continue;
        };
        for group in &resolved.group_depends {
            let Some(members) = members.get(group) else {
                trace!("Group `{group}` of `{name}` has no members");
                continue;
            };
            for member in members {
                if member == name || resolved.dependencies.contains(member) {
                    continue;
                }
                resolved.dependencies.push(member.clone());
                resolved.group_dependencies.push(member.clone());
            }
        }
    }
}
