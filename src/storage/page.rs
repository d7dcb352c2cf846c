// Fixed-size slotted page. The 32-byte little-endian header is followed by
// a slot directory growing toward high addresses and row data growing down
// from the end of the page:
//
//   page_id:u32 | row_count:u32 | free_space_start:u32 | free_space_end:u32
//   | flags:u32 | reserved[12]
//
// Each slot is `offset:u32, length:u32`; `(0, 0)` marks a tombstone. Slot
// indexes are append-only and stable for the page's lifetime. Space freed by
// tombstones is never reclaimed: `free_space_end` only moves downward.

use crate::common::PageId;
use crate::config::{PAGE_HEADER_SIZE, PAGE_SIZE, SLOT_SIZE};

const OFF_PAGE_ID: usize = 0;
const OFF_ROW_COUNT: usize = 4;
const OFF_FREE_START: usize = 8;
const OFF_FREE_END: usize = 12;
const OFF_FLAGS: usize = 16;

/// A single slotted page of a table data file.
#[derive(Debug, Clone)]
pub struct Page {
    data: Vec<u8>,
    dirty: bool,
}

impl Page {
    /// Create a blank page with an empty slot directory.
    pub fn new(page_id: PageId) -> Self {
        let mut page = Self {
            data: vec![0; PAGE_SIZE],
            dirty: true,
        };
        page.write_u32(OFF_PAGE_ID, page_id);
        page.write_u32(OFF_ROW_COUNT, 0);
        page.write_u32(OFF_FREE_START, PAGE_HEADER_SIZE as u32);
        page.write_u32(OFF_FREE_END, PAGE_SIZE as u32);
        page.write_u32(OFF_FLAGS, 0);
        page
    }

    /// Rehydrate a page from its on-disk image, validating the header
    /// invariants.
    pub fn from_bytes(data: Vec<u8>) -> std::result::Result<Self, &'static str> {
        if data.len() != PAGE_SIZE {
            return Err("page image has wrong length");
        }
        let page = Self { data, dirty: false };
        let start = page.free_space_start();
        let end = page.free_space_end();
        if start < PAGE_HEADER_SIZE || start > end || end > PAGE_SIZE {
            return Err("corrupt page header: free-space bounds out of range");
        }
        if PAGE_HEADER_SIZE + page.slot_count() * SLOT_SIZE != start {
            return Err("corrupt page header: slot directory does not match free_space_start");
        }
        Ok(page)
    }

    /// Raw page image, exactly `PAGE_SIZE` bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn page_id(&self) -> PageId {
        self.read_u32(OFF_PAGE_ID)
    }

    /// Number of slots, tombstones included.
    pub fn slot_count(&self) -> usize {
        self.read_u32(OFF_ROW_COUNT) as usize
    }

    pub fn free_space_start(&self) -> usize {
        self.read_u32(OFF_FREE_START) as usize
    }

    pub fn free_space_end(&self) -> usize {
        self.read_u32(OFF_FREE_END) as usize
    }

    /// Contiguous free bytes between the slot directory and the row heap.
    pub fn free_space(&self) -> usize {
        self.free_space_end() - self.free_space_start()
    }

    /// A page with less than one slot entry of free space can never accept
    /// another row.
    pub fn is_full(&self) -> bool {
        self.free_space() < SLOT_SIZE
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Append a row, returning its slot index, or `None` when the row plus
    /// its slot entry does not fit.
    pub fn insert_row(&mut self, bytes: &[u8]) -> Option<usize> {
        if bytes.len() + SLOT_SIZE > self.free_space() {
            return None;
        }
        let slot = self.slot_count();
        let offset = self.free_space_end() - bytes.len();
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.write_slot(slot, offset as u32, bytes.len() as u32);
        self.write_u32(OFF_ROW_COUNT, (slot + 1) as u32);
        self.write_u32(OFF_FREE_START, (PAGE_HEADER_SIZE + (slot + 1) * SLOT_SIZE) as u32);
        self.write_u32(OFF_FREE_END, offset as u32);
        self.dirty = true;
        Some(slot)
    }

    /// Row bytes at `slot`; `None` for tombstones and out-of-range slots.
    pub fn read_row(&self, slot: usize) -> Option<&[u8]> {
        if slot >= self.slot_count() {
            return None;
        }
        let (offset, length) = self.read_slot(slot);
        if offset == 0 && length == 0 {
            return None;
        }
        Some(&self.data[offset as usize..(offset + length) as usize])
    }

    /// Rewrite the row at `slot`. In place when the new image is no longer
    /// than the slot; otherwise the old slot is tombstoned and the row is
    /// re-appended within this page. Returns the slot the row now occupies,
    /// or `None` when the page cannot fit the new image (the page is left
    /// untouched in that case).
    pub fn update_row(&mut self, slot: usize, bytes: &[u8]) -> Option<usize> {
        if slot >= self.slot_count() {
            return None;
        }
        let (offset, length) = self.read_slot(slot);
        if offset == 0 && length == 0 {
            return None;
        }
        if bytes.len() <= length as usize {
            let offset = offset as usize;
            self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
            self.write_slot(slot, offset as u32, bytes.len() as u32);
            self.dirty = true;
            return Some(slot);
        }
        if bytes.len() + SLOT_SIZE > self.free_space() {
            return None;
        }
        self.write_slot(slot, 0, 0);
        self.insert_row(bytes)
    }

    /// Tombstone the slot. The slot index stays allocated; its space is not
    /// reclaimed.
    pub fn delete_row(&mut self, slot: usize) {
        if slot >= self.slot_count() {
            return;
        }
        self.write_slot(slot, 0, 0);
        self.dirty = true;
    }

    /// Live rows in slot order, tombstones skipped.
    pub fn iter_rows(&self) -> impl Iterator<Item = (usize, &[u8])> {
        (0..self.slot_count()).filter_map(move |slot| self.read_row(slot).map(|bytes| (slot, bytes)))
    }

    fn read_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.data[offset..offset + 4].try_into().unwrap())
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn slot_offset(slot: usize) -> usize {
        PAGE_HEADER_SIZE + slot * SLOT_SIZE
    }

    fn read_slot(&self, slot: usize) -> (u32, u32) {
        let base = Self::slot_offset(slot);
        (self.read_u32(base), self.read_u32(base + 4))
    }

    fn write_slot(&mut self, slot: usize, offset: u32, length: u32) {
        let base = Self::slot_offset(slot);
        self.write_u32(base, offset);
        self.write_u32(base + 4, length);
    }
}
