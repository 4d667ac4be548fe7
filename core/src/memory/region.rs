use serde::{Deserialize, Serialize};

/// Handle to a block of bytes owned by the machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionId(pub usize);

/// A named block of ROM or RAM.
pub struct MemoryRegion {
    pub name: String,
    pub data: Vec<u8>,
    /// Included in save states (RAM and NVRAM, not ROM).
    pub saved: bool,
}

/// Every region of a machine, addressed by [`RegionId`].
#[derive(Default)]
pub struct Regions {
    regions: Vec<MemoryRegion>,
}

impl Regions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, data: Vec<u8>, saved: bool) -> RegionId {
        let id = RegionId(self.regions.len());
        self.regions.push(MemoryRegion {
            name: name.into(),
            data,
            saved,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, id: RegionId) -> Option<&MemoryRegion> {
        self.regions.get(id.0)
    }

    pub fn data(&self, id: RegionId) -> Option<&[u8]> {
        self.regions.get(id.0).map(|r| r.data.as_slice())
    }

    pub fn data_mut(&mut self, id: RegionId) -> Option<&mut [u8]> {
        self.regions.get_mut(id.0).map(|r| r.data.as_mut_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegionId, &MemoryRegion)> {
        self.regions.iter().enumerate().map(|(i, r)| (RegionId(i), r))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut MemoryRegion> {
        self.regions.iter_mut()
    }

    #[inline]
    pub(crate) fn byte(&self, id: RegionId, index: usize) -> Option<u8> {
        self.regions.get(id.0)?.data.get(index).copied()
    }

    #[inline]
    pub(crate) fn set_byte(&mut self, id: RegionId, index: usize, value: u8) -> bool {
        match self.regions.get_mut(id.0).and_then(|r| r.data.get_mut(index)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}
