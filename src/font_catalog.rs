use std::path::{Path, PathBuf};

use crate::backend::FontBackend;
use crate::error::{Error, Result};
use crate::face_id::FaceTriplet;

/// One face of a loaded font file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaceSlot {
    /// `None` when the face failed to probe.
    named_instances: Option<u32>,
    family_name: String,
    style_name: String,
}

impl FaceSlot {
    fn invalid() -> Self {
        Self {
            named_instances: None,
            family_name: String::new(),
            style_name: String::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.named_instances.is_some()
    }

    /// Number of named instances, `Some(0)` for a static face, `None` if invalid.
    pub fn named_instances(&self) -> Option<u32> {
        self.named_instances
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn style_name(&self) -> &str {
        &self.style_name
    }
}

/// A loaded font file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Font {
    path: PathBuf,
    faces: Vec<FaceSlot>,
}

impl Font {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Number of faces in the file, including the ones that failed to probe.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn face(&self, face_index: u32) -> Option<&FaceSlot> {
        self.faces.get(face_index as usize)
    }

    /// A font without any valid face keeps its slot but is never navigated to.
    pub fn is_valid(&self) -> bool {
        self.faces.iter().any(FaceSlot::is_valid)
    }

    fn valid_faces(&self) -> Vec<u32> {
        (0..self.faces.len() as u32)
            .filter(|&i| self.faces[i as usize].is_valid())
            .collect()
    }
}

/// A relative or absolute move of a navigation cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Offset(i64),
    ToStart,
    ToEnd,
}

impl Step {
    pub const NEXT: Step = Step::Offset(1);
    pub const PREVIOUS: Step = Step::Offset(-1);

    /// Applies the step to position `current` in a list of `len` candidates,
    /// clamping at both ends.
    pub fn apply(self, current: usize, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let last = len as i64 - 1;
        match self {
            Step::ToStart => 0,
            Step::ToEnd => last as usize,
            Step::Offset(offset) => (current as i64).saturating_add(offset).clamp(0, last) as usize,
        }
    }
}

/// Ordered list of loaded fonts plus the current font/face/instance cursor.
#[derive(Default)]
pub struct FontCatalog {
    fonts: Vec<Font>,
    current: Option<FaceTriplet>,
}

impl FontCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probes `path` and appends it to the catalog.
    ///
    /// Faces that fail to probe are kept as invalid slots. A font without any
    /// valid face is appended as well, so indices stay stable until `close`.
    pub fn load(&mut self, path: impl Into<PathBuf>, backend: &mut impl FontBackend) -> Result<usize> {
        let path = path.into();

        let probe = backend.probe(&path).map_err(|e| {
            log::warn!("Failed to load font `{}`: {}", path.display(), e);
            Error::FileProbeFailed {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;

        let faces = probe
            .faces
            .into_iter()
            .map(|face| match face {
                Some(face) => FaceSlot {
                    named_instances: Some(face.named_instances),
                    family_name: face.family_name,
                    style_name: face.style_name,
                },
                None => FaceSlot::invalid(),
            })
            .collect();

        let font = Font { path, faces };
        if !font.is_valid() {
            log::warn!("Font `{}` has no usable face", font.path.display());
        }

        self.fonts.push(font);
        let index = self.fonts.len() - 1;

        if self.current.is_none() {
            self.current = self.first_position_in(index);
        }

        Ok(index)
    }

    /// Removes the font at `index`; later fonts shift down by one.
    pub fn close(&mut self, index: usize) -> Result<Font> {
        if index >= self.fonts.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.fonts.len(),
            });
        }

        let font = self.fonts.remove(index);

        self.current = match self.current {
            Some(current) if current.font_index > index => Some(FaceTriplet {
                font_index: current.font_index - 1,
                ..current
            }),
            Some(current) if current.font_index == index => {
                // prefer the font that slid into the closed slot
                (index..self.fonts.len())
                    .chain((0..index).rev())
                    .find_map(|i| self.first_position_in(i))
            }
            other => other,
        };

        Ok(font)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn font(&self, index: usize) -> Option<&Font> {
        self.fonts.get(index)
    }

    pub fn fonts(&self) -> impl Iterator<Item = &Font> {
        self.fonts.iter()
    }

    pub fn current(&self) -> Option<FaceTriplet> {
        self.current
    }

    /// Moves the cursor to an explicit position.
    pub fn set_current(&mut self, triplet: FaceTriplet) -> Result<()> {
        let font = self
            .fonts
            .get(triplet.font_index)
            .ok_or(Error::IndexOutOfRange {
                index: triplet.font_index,
                len: self.fonts.len(),
            })?;

        let face = font
            .face(triplet.face_index)
            .filter(|face| face.is_valid())
            .ok_or(Error::InvalidFaceIndex {
                font: triplet.font_index,
                face: triplet.face_index,
            })?;

        if Some(triplet.named_instance_index) > face.named_instances {
            return Err(Error::InvalidInstanceIndex {
                font: triplet.font_index,
                face: triplet.face_index,
                instance: triplet.named_instance_index,
            });
        }

        self.current = Some(triplet);
        Ok(())
    }

    fn first_position_in(&self, font_index: usize) -> Option<FaceTriplet> {
        let face_index = *self.fonts.get(font_index)?.valid_faces().first()?;
        Some(FaceTriplet::new(font_index, face_index, 0))
    }
}

/// navigation
impl FontCatalog {
    /// Moves between valid fonts. Face and instance restart at the first valid one.
    pub fn step_font(&mut self, step: Step) -> bool {
        let Some(current) = self.current else {
            return false;
        };

        let valid: Vec<usize> = (0..self.fonts.len())
            .filter(|&i| self.fonts[i].is_valid())
            .collect();
        let Some(position) = valid.iter().position(|&i| i == current.font_index) else {
            return false;
        };

        let target = valid[step.apply(position, valid.len())];
        if target == current.font_index {
            return false;
        }

        self.current = self.first_position_in(target);
        self.current.is_some()
    }

    /// Moves between the valid faces of the current font.
    pub fn step_face(&mut self, step: Step) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        let Some(font) = self.fonts.get(current.font_index) else {
            return false;
        };

        let valid = font.valid_faces();
        let Some(position) = valid.iter().position(|&i| i == current.face_index) else {
            return false;
        };

        let target = valid[step.apply(position, valid.len())];
        if target == current.face_index {
            return false;
        }

        self.current = Some(FaceTriplet::new(current.font_index, target, 0));
        true
    }

    /// Moves between the default instance (`0`) and the named instances of the current face.
    pub fn step_instance(&mut self, step: Step) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        let Some(count) = self
            .fonts
            .get(current.font_index)
            .and_then(|font| font.face(current.face_index))
            .and_then(FaceSlot::named_instances)
        else {
            return false;
        };

        let target = step.apply(current.named_instance_index as usize, count as usize + 1) as u32;
        if target == current.named_instance_index {
            return false;
        }

        self.current = Some(FaceTriplet {
            named_instance_index: target,
            ..current
        });
        true
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::test_backend::{TestBackend, TestFace};

    fn backend() -> TestBackend {
        let mut backend = TestBackend::new();
        backend.add("static.ttf", vec![Some(TestFace::new("Static", 0))]);
        backend.add(
            "half-broken.ttc",
            vec![Some(TestFace::new("Half", 0)), None],
        );
        backend.add("broken.ttf", vec![None, None]);
        backend.add("empty.ttc", vec![]);
        backend.add(
            "collection.ttc",
            vec![
                Some(TestFace::new("Coll A", 0)),
                None,
                Some(TestFace::new("Coll C", 3)),
            ],
        );
        backend
    }

    #[test]
    fn static_font_has_one_face_and_no_instances() {
        let mut backend = backend();
        let mut catalog = FontCatalog::new();
        let index = catalog.load("static.ttf", &mut backend).unwrap();

        let font = catalog.font(index).unwrap();
        assert_eq!(font.face_count(), 1);
        assert_eq!(font.face(0).unwrap().named_instances(), Some(0));
        assert_eq!(catalog.current(), Some(FaceTriplet::new(0, 0, 0)));

        assert!(!catalog.step_instance(Step::NEXT));
        assert_eq!(catalog.current(), Some(FaceTriplet::new(0, 0, 0)));
    }

    #[test]
    fn broken_face_is_kept_but_skipped() {
        let mut backend = backend();
        let mut catalog = FontCatalog::new();
        catalog.load("half-broken.ttc", &mut backend).unwrap();

        let font = catalog.font(0).unwrap();
        assert_eq!(font.face_count(), 2);
        assert!(font.face(0).unwrap().is_valid());
        assert_eq!(font.face(1).unwrap().named_instances(), None);

        assert!(!catalog.step_face(Step::NEXT));
        assert!(!catalog.step_face(Step::ToEnd));
        assert_eq!(catalog.current(), Some(FaceTriplet::new(0, 0, 0)));
    }

    #[test]
    fn unreadable_file_is_not_added() {
        let mut backend = backend();
        let mut catalog = FontCatalog::new();

        let result = catalog.load("missing.ttf", &mut backend);
        assert!(matches!(result, Err(Error::FileProbeFailed { .. })));
        assert!(catalog.is_empty());
        assert_eq!(catalog.current(), None);
    }

    #[test]
    fn fonts_without_valid_faces_keep_their_slot() {
        let mut backend = backend();
        let mut catalog = FontCatalog::new();

        assert_eq!(catalog.load("broken.ttf", &mut backend).unwrap(), 0);
        assert_eq!(catalog.load("empty.ttc", &mut backend).unwrap(), 1);
        assert_eq!(catalog.current(), None);

        assert_eq!(catalog.load("static.ttf", &mut backend).unwrap(), 2);
        assert!(!catalog.font(0).unwrap().is_valid());
        assert!(!catalog.font(1).unwrap().is_valid());
        assert_eq!(catalog.current(), Some(FaceTriplet::new(2, 0, 0)));

        // invalid fonts are never navigated to
        assert!(!catalog.step_font(Step::PREVIOUS));
        assert!(!catalog.step_font(Step::ToStart));
    }

    #[test]
    fn navigation_skips_invalid_faces_and_clamps() {
        let mut backend = backend();
        let mut catalog = FontCatalog::new();
        catalog.load("collection.ttc", &mut backend).unwrap();

        assert!(catalog.step_face(Step::NEXT));
        assert_eq!(catalog.current(), Some(FaceTriplet::new(0, 2, 0)));
        assert!(!catalog.step_face(Step::NEXT));

        assert!(catalog.step_instance(Step::Offset(10)));
        assert_eq!(catalog.current(), Some(FaceTriplet::new(0, 2, 3)));
        assert!(catalog.step_instance(Step::PREVIOUS));
        assert_eq!(catalog.current(), Some(FaceTriplet::new(0, 2, 2)));
        assert!(catalog.step_instance(Step::ToStart));
        assert_eq!(catalog.current(), Some(FaceTriplet::new(0, 2, 0)));

        assert!(catalog.step_face(Step::ToStart));
        assert_eq!(catalog.current(), Some(FaceTriplet::new(0, 0, 0)));
    }

    #[test]
    fn font_navigation_does_not_wrap() {
        let mut backend = backend();
        let mut catalog = FontCatalog::new();
        catalog.load("static.ttf", &mut backend).unwrap();
        catalog.load("broken.ttf", &mut backend).unwrap();
        catalog.load("collection.ttc", &mut backend).unwrap();

        assert!(catalog.step_font(Step::NEXT));
        assert_eq!(catalog.current(), Some(FaceTriplet::new(2, 0, 0)));
        assert!(!catalog.step_font(Step::NEXT));
        assert_eq!(catalog.current(), Some(FaceTriplet::new(2, 0, 0)));

        assert!(catalog.step_font(Step::PREVIOUS));
        assert_eq!(catalog.current(), Some(FaceTriplet::new(0, 0, 0)));
        assert!(!catalog.step_font(Step::PREVIOUS));
    }

    #[test]
    fn close_shifts_later_fonts_down() {
        let mut backend = backend();
        let mut catalog = FontCatalog::new();
        catalog.load("static.ttf", &mut backend).unwrap();
        catalog.load("half-broken.ttc", &mut backend).unwrap();
        catalog.load("collection.ttc", &mut backend).unwrap();
        catalog.set_current(FaceTriplet::new(2, 2, 1)).unwrap();

        let closed = catalog.close(0).unwrap();
        assert_eq!(closed.path(), Path::new("static.ttf"));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.font(0).unwrap().path(), Path::new("half-broken.ttc"));
        assert_eq!(catalog.font(1).unwrap().path(), Path::new("collection.ttc"));
        assert_eq!(catalog.current(), Some(FaceTriplet::new(1, 2, 1)));

        assert_eq!(
            catalog.close(5).unwrap_err(),
            Error::IndexOutOfRange { index: 5, len: 2 }
        );
    }

    #[test]
    fn closing_the_current_font_moves_to_a_neighbour() {
        let mut backend = backend();
        let mut catalog = FontCatalog::new();
        catalog.load("static.ttf", &mut backend).unwrap();
        catalog.load("collection.ttc", &mut backend).unwrap();
        catalog.set_current(FaceTriplet::new(1, 2, 2)).unwrap();

        catalog.close(1).unwrap();
        assert_eq!(catalog.current(), Some(FaceTriplet::new(0, 0, 0)));

        catalog.close(0).unwrap();
        assert_eq!(catalog.current(), None);
        assert!(!catalog.step_font(Step::NEXT));
    }

    #[test]
    fn set_current_validates_the_triplet() {
        let mut backend = backend();
        let mut catalog = FontCatalog::new();
        catalog.load("collection.ttc", &mut backend).unwrap();

        assert_eq!(
            catalog.set_current(FaceTriplet::new(0, 1, 0)),
            Err(Error::InvalidFaceIndex { font: 0, face: 1 })
        );
        assert_eq!(
            catalog.set_current(FaceTriplet::new(0, 2, 4)),
            Err(Error::InvalidInstanceIndex {
                font: 0,
                face: 2,
                instance: 4
            })
        );
        assert!(catalog.set_current(FaceTriplet::new(0, 2, 3)).is_ok());
    }
}
