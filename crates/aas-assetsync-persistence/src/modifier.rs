//! Output views over stored elements.

use aas_assetsync_core::{ElementContent, Referable, SubmodelElement};

/// How much of the element tree to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    /// The whole subtree
    #[default]
    Deep,
    /// The element and its direct children only
    Core,
}

/// Whether blob content is included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Extent {
    /// Blob content included
    #[default]
    WithBlobValue,
    /// Blob content cleared
    WithoutBlobValue,
}

/// View applied to every read from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputModifier {
    /// Tree depth
    pub level: Level,
    /// Blob handling
    pub extent: Extent,
}

impl OutputModifier {
    /// Full depth, blob content included.
    pub const DEFAULT: Self = Self {
        level: Level::Deep,
        extent: Extent::WithBlobValue,
    };

    /// Apply this view to a referable.
    #[must_use]
    pub fn apply(&self, referable: Referable) -> Referable {
        match referable {
            Referable::Submodel(mut submodel) => {
                self.apply_children(&mut submodel.submodel_elements);
                Referable::Submodel(submodel)
            }
            Referable::SubmodelElement(mut element) => {
                self.apply_element(&mut element);
                Referable::SubmodelElement(element)
            }
            shell @ Referable::Shell(_) => shell,
        }
    }

    /// Apply this view to a list of sibling elements.
    pub fn apply_children(&self, children: &mut [SubmodelElement]) {
        for child in children {
            if self.level == Level::Core {
                if let Some(grandchildren) = child.children_mut() {
                    grandchildren.clear();
                }
            }
            self.apply_element(child);
        }
    }

    fn apply_element(&self, element: &mut SubmodelElement) {
        if self.extent == Extent::WithoutBlobValue {
            clear_blobs(element);
        }
        if let Some(children) = element.children_mut() {
            self.apply_children(children);
        }
    }
}

fn clear_blobs(element: &mut SubmodelElement) {
    if let ElementContent::Blob { value, .. } = &mut element.content {
        *value = None;
    }
}
